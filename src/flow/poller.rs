//! # Payment Status Poller
//!
//! After the customer is sent to the gateway, the poller re-reads the order
//! until the backend reports a terminal payment outcome, the attempt ceiling
//! is reached, or the status endpoint keeps failing.
//!
//! ## States
//!
//! - `Polling`: checks are still being scheduled
//! - `Succeeded`: approved payment or confirmed order, routes to the success page
//! - `Failed`: rejected payment or cancelled order, routes back to checkout
//! - `TimedOut`: no decision within the ceilings, routes to the pending page
//! - `Aborted`: unmounted before a decision, routes nowhere
//!
//! Ticks run strictly one after another: the next check is scheduled only
//! once the previous fetch has resolved or timed out.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use super::liveness::Liveness;
use super::navigation::{navigate_once, Navigator, Route};
use crate::clients::OrderStore;
use crate::config::PollerConfig;
use crate::error::CheckoutError;
use crate::models::{Order, OrderId, PaymentSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Polling,
    Succeeded,
    Failed,
    TimedOut,
    Aborted,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        self != PollState::Polling
    }

    /// Where the session goes once this state is reached.
    pub fn route(self, order_id: &OrderId) -> Option<Route> {
        match self {
            PollState::Succeeded => Some(Route::PaymentSuccess {
                order_id: order_id.clone(),
            }),
            PollState::Failed => Some(Route::Checkout),
            PollState::TimedOut => Some(Route::PaymentPending {
                order_id: order_id.clone(),
            }),
            PollState::Polling | PollState::Aborted => None,
        }
    }
}

/// Progress published after every tick, for the attempt counter in the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollSnapshot {
    pub order_id: OrderId,
    pub state: PollState,
    pub attempt: u32,
    pub max_attempts: u32,
    pub consecutive_errors: u32,
}

impl PollSnapshot {
    pub fn progress_percent(&self) -> u8 {
        if self.max_attempts == 0 {
            return 100;
        }
        let pct = (u64::from(self.attempt) * 100) / u64::from(self.max_attempts);
        pct.min(100) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    Continue { delay: Duration },
    Finish(PollState),
}

/// Extra pause after `consecutive_errors` failed fetches in a row:
/// `min(consecutive_errors * base_error_delay, max_error_delay)`.
pub fn error_backoff(consecutive_errors: u32, config: &PollerConfig) -> Duration {
    config
        .base_error_delay
        .saturating_mul(consecutive_errors)
        .min(config.max_error_delay)
}

/// Counters of one polling run. Owns no I/O; the runner feeds it outcomes.
#[derive(Debug, Clone)]
pub struct PollSession {
    order_id: OrderId,
    attempt: u32,
    consecutive_errors: u32,
    state: PollState,
}

impl PollSession {
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            attempt: 0,
            consecutive_errors: 0,
            state: PollState::Polling,
        }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Count a fetch about to be issued.
    pub fn begin_tick(&mut self) {
        self.attempt += 1;
    }

    pub fn record_order(&mut self, order: &Order, config: &PollerConfig) -> TickDecision {
        self.consecutive_errors = 0;
        match order.payment_signal() {
            PaymentSignal::Success => self.finish(PollState::Succeeded),
            PaymentSignal::Failure => self.finish(PollState::Failed),
            PaymentSignal::Undecided if self.attempt >= config.max_attempts => self.finish(PollState::TimedOut),
            PaymentSignal::Undecided => TickDecision::Continue {
                delay: config.interval,
            },
        }
    }

    pub fn record_error(&mut self, config: &PollerConfig) -> TickDecision {
        self.consecutive_errors += 1;
        if self.consecutive_errors >= config.max_consecutive_errors || self.attempt >= config.max_attempts {
            return self.finish(PollState::TimedOut);
        }
        TickDecision::Continue {
            delay: config.interval + error_backoff(self.consecutive_errors, config),
        }
    }

    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.state = PollState::Aborted;
        }
    }

    pub fn snapshot(&self, config: &PollerConfig) -> PollSnapshot {
        PollSnapshot {
            order_id: self.order_id.clone(),
            state: self.state,
            attempt: self.attempt,
            max_attempts: config.max_attempts,
            consecutive_errors: self.consecutive_errors,
        }
    }

    fn finish(&mut self, state: PollState) -> TickDecision {
        self.state = state;
        TickDecision::Finish(state)
    }
}

/// Drives a [`PollSession`] against the order store.
pub struct PaymentPoller {
    orders: Arc<dyn OrderStore>,
    navigator: Arc<dyn Navigator>,
    config: PollerConfig,
}

impl PaymentPoller {
    pub fn new(orders: Arc<dyn OrderStore>, navigator: Arc<dyn Navigator>, config: PollerConfig) -> Self {
        Self {
            orders,
            navigator,
            config,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Poll until a terminal state. Navigates at most once, and never after
    /// `live` reports a teardown.
    pub async fn run(
        &self,
        order_id: OrderId,
        mut live: Liveness,
        progress: watch::Sender<PollSnapshot>,
    ) -> PollState {
        let mut session = PollSession::new(order_id);
        progress.send_replace(session.snapshot(&self.config));

        if !pause(&mut live, self.config.initial_delay).await {
            return self.abort(&mut session, &progress);
        }

        loop {
            session.begin_tick();
            info!(
                order_id = %session.order_id(),
                "Checking payment status, attempt {}/{}",
                session.attempt(),
                self.config.max_attempts
            );

            let fetched = tokio::select! {
                fetched = tokio::time::timeout(
                    self.config.request_timeout,
                    self.orders.get_order(session.order_id()),
                ) => fetched.unwrap_or(Err(CheckoutError::Timeout)),
                _ = live.torn_down() => return self.abort(&mut session, &progress),
            };
            if !live.is_alive() {
                return self.abort(&mut session, &progress);
            }

            let decision = match fetched {
                Ok(order) => session.record_order(&order, &self.config),
                Err(e) => {
                    warn!(
                        order_id = %session.order_id(),
                        consecutive_errors = session.consecutive_errors() + 1,
                        "Payment status check failed: {}", e
                    );
                    session.record_error(&self.config)
                }
            };
            progress.send_replace(session.snapshot(&self.config));

            match decision {
                TickDecision::Finish(state) => return self.conclude(&session, state, &live),
                TickDecision::Continue { delay } => {
                    if !pause(&mut live, delay).await {
                        return self.abort(&mut session, &progress);
                    }
                }
            }
        }
    }

    fn conclude(&self, session: &PollSession, state: PollState, live: &Liveness) -> PollState {
        info!(
            order_id = %session.order_id(),
            attempts = session.attempt(),
            ?state,
            "Payment polling finished"
        );
        if let Some(route) = state.route(session.order_id()) {
            if live.is_alive() {
                navigate_once(self.navigator.as_ref(), session.order_id(), route);
            }
        }
        state
    }

    fn abort(&self, session: &mut PollSession, progress: &watch::Sender<PollSnapshot>) -> PollState {
        session.abort();
        progress.send_replace(session.snapshot(&self.config));
        info!(order_id = %session.order_id(), attempts = session.attempt(), "Payment polling aborted");
        PollState::Aborted
    }
}

/// Sleep for `delay` unless torn down first. Returns whether still mounted.
async fn pause(live: &mut Liveness, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => live.is_alive(),
        _ = live.torn_down() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CheckoutError, Result};
    use crate::flow::liveness::MountGuard;
    use crate::flow::navigation::{MountedNavigator, SessionNavigator};
    use crate::models::{NewOrder, OrderStatus, PaymentStatus};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    enum Reply {
        Status(OrderStatus, PaymentStatus),
        NetworkError,
        Hang,
    }

    /// Replays scripted replies; once exhausted, keeps answering pending.
    struct ScriptedStore {
        replies: Mutex<VecDeque<Reply>>,
        calls: AtomicU32,
    }

    impl ScriptedStore {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OrderStore for ScriptedStore {
        async fn create_order(&self, _order: &NewOrder) -> Result<Order> {
            unreachable!("the poller never creates orders")
        }

        async fn get_order(&self, order_id: &OrderId) -> Result<Order> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.replies.lock().unwrap().pop_front();
            match reply.unwrap_or(Reply::Status(OrderStatus::Pending, PaymentStatus::Pending)) {
                Reply::Status(status, payment) => Ok(order(order_id, status, payment)),
                Reply::NetworkError => Err(CheckoutError::Backend {
                    status: 503,
                    body: "unavailable".to_string(),
                }),
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    /// Navigator that also keeps every navigation it was asked to perform.
    #[derive(Default)]
    struct RecordingNavigator {
        inner: SessionNavigator,
        history: Mutex<Vec<Route>>,
    }

    impl RecordingNavigator {
        fn history(&self) -> Vec<Route> {
            self.history.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, route: Route) {
            self.history.lock().unwrap().push(route.clone());
            self.inner.navigate(route);
        }

        fn current(&self) -> Option<Route> {
            self.inner.current()
        }
    }

    fn order(id: &OrderId, status: OrderStatus, payment: PaymentStatus) -> Order {
        Order {
            id: id.clone(),
            status,
            payment_status: Some(payment),
            items: Vec::new(),
            customer_info: None,
            subtotal: 100.0,
            shipping: 0.0,
            total: 100.0,
        }
    }

    fn pending() -> Reply {
        Reply::Status(OrderStatus::Pending, PaymentStatus::Pending)
    }

    fn approved() -> Reply {
        Reply::Status(OrderStatus::Pending, PaymentStatus::Approved)
    }

    fn config() -> PollerConfig {
        PollerConfig {
            max_attempts: 10,
            ..PollerConfig::default()
        }
    }

    async fn run_to_end(
        store: Arc<ScriptedStore>,
        nav: Arc<RecordingNavigator>,
        config: PollerConfig,
    ) -> (PollState, PollSnapshot) {
        let id = OrderId::new("77");
        let poller = PaymentPoller::new(store, nav, config.clone());
        let (guard, live) = MountGuard::new();
        let (tx, rx) = watch::channel(PollSession::new(id.clone()).snapshot(&config));
        let state = poller.run(id, live, tx).await;
        drop(guard);
        let last = rx.borrow().clone();
        (state, last)
    }

    #[test]
    fn backoff_is_monotonic_and_capped() {
        let config = PollerConfig::default();
        let delays: Vec<Duration> = (0..20).map(|n| error_backoff(n, &config)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(error_backoff(1, &config), Duration::from_secs(2));
        assert_eq!(error_backoff(3, &config), Duration::from_secs(6));
        assert_eq!(error_backoff(19, &config), config.max_error_delay);
        assert_eq!(error_backoff(u32::MAX, &config), config.max_error_delay);
    }

    #[test]
    fn error_adds_backoff_on_top_of_interval() {
        let config = PollerConfig::default();
        let mut session = PollSession::new(OrderId::new("1"));
        session.begin_tick();
        assert_eq!(
            session.record_error(&config),
            TickDecision::Continue {
                delay: Duration::from_secs(10)
            }
        );
        session.begin_tick();
        assert_eq!(
            session.record_error(&config),
            TickDecision::Continue {
                delay: Duration::from_secs(12)
            }
        );
    }

    #[test]
    fn success_signals_win_over_failure_signals() {
        let config = PollerConfig::default();
        let id = OrderId::new("1");
        let mut session = PollSession::new(id.clone());
        session.begin_tick();
        let mixed = order(&id, OrderStatus::Cancelled, PaymentStatus::Approved);
        assert_eq!(session.record_order(&mixed, &config), TickDecision::Finish(PollState::Succeeded));
    }

    #[test]
    fn confirmed_status_alone_is_success() {
        let config = PollerConfig::default();
        let id = OrderId::new("1");
        let mut session = PollSession::new(id.clone());
        session.begin_tick();
        let confirmed = order(&id, OrderStatus::Confirmed, PaymentStatus::Pending);
        assert_eq!(session.record_order(&confirmed, &config), TickDecision::Finish(PollState::Succeeded));
    }

    #[test]
    fn abort_does_not_overwrite_a_terminal_state() {
        let config = PollerConfig::default();
        let id = OrderId::new("1");
        let mut session = PollSession::new(id.clone());
        session.begin_tick();
        session.record_order(&order(&id, OrderStatus::Pending, PaymentStatus::Rejected), &config);
        session.abort();
        assert_eq!(session.state(), PollState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_success_needs_no_second_fetch() {
        let store = ScriptedStore::new(vec![approved()]);
        let nav = Arc::new(RecordingNavigator::default());

        let (state, snapshot) = run_to_end(store.clone(), nav.clone(), config()).await;

        assert_eq!(state, PollState::Succeeded);
        assert_eq!(store.calls(), 1);
        assert_eq!(snapshot.attempt, 1);
        assert_eq!(
            nav.history(),
            vec![Route::PaymentSuccess {
                order_id: OrderId::new("77")
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn happy_path_pending_then_approved() {
        let store = ScriptedStore::new(vec![pending(), approved()]);
        let nav = Arc::new(RecordingNavigator::default());

        let started = tokio::time::Instant::now();
        let (state, _) = run_to_end(store.clone(), nav.clone(), config()).await;

        assert_eq!(state, PollState::Succeeded);
        assert_eq!(store.calls(), 2);
        // initial delay + one interval
        assert_eq!(started.elapsed(), Duration::from_secs(9));
        assert_eq!(
            nav.history(),
            vec![Route::PaymentSuccess {
                order_id: OrderId::new("77")
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_rejection_routes_to_checkout() {
        let store = ScriptedStore::new(vec![Reply::Status(OrderStatus::Pending, PaymentStatus::Rejected)]);
        let nav = Arc::new(RecordingNavigator::default());

        let (state, _) = run_to_end(store.clone(), nav.clone(), config()).await;

        assert_eq!(state, PollState::Failed);
        assert_eq!(store.calls(), 1);
        assert_eq!(nav.history(), vec![Route::Checkout]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_order_is_a_failure() {
        let store = ScriptedStore::new(vec![pending(), Reply::Status(OrderStatus::Cancelled, PaymentStatus::Pending)]);
        let nav = Arc::new(RecordingNavigator::default());

        let (state, _) = run_to_end(store, nav.clone(), config()).await;

        assert_eq!(state, PollState::Failed);
        assert_eq!(nav.history(), vec![Route::Checkout]);
    }

    #[tokio::test(start_paused = true)]
    async fn flaky_network_recovers_and_resets_error_count() {
        let store = ScriptedStore::new(vec![
            Reply::NetworkError,
            Reply::NetworkError,
            Reply::NetworkError,
            approved(),
        ]);
        let nav = Arc::new(RecordingNavigator::default());

        let started = tokio::time::Instant::now();
        let (state, snapshot) = run_to_end(store.clone(), nav.clone(), config()).await;

        assert_eq!(state, PollState::Succeeded);
        assert_eq!(store.calls(), 4);
        assert_eq!(snapshot.consecutive_errors, 0);
        // 1s head start, then 8s + 2s, 8s + 4s, 8s + 6s
        assert_eq!(started.elapsed(), Duration::from_secs(37));
        assert_eq!(
            nav.history(),
            vec![Route::PaymentSuccess {
                order_id: OrderId::new("77")
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_errors_end_on_the_pending_page() {
        let store = ScriptedStore::new((0..10).map(|_| Reply::NetworkError).collect());
        let nav = Arc::new(RecordingNavigator::default());

        let (state, snapshot) = run_to_end(store.clone(), nav.clone(), config()).await;

        assert_eq!(state, PollState::TimedOut);
        assert_eq!(store.calls(), 5);
        assert_eq!(snapshot.consecutive_errors, 5);
        assert_eq!(
            nav.history(),
            vec![Route::PaymentPending {
                order_id: OrderId::new("77")
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn all_pending_times_out_after_max_attempts() {
        let store = ScriptedStore::new(Vec::new());
        let nav = Arc::new(RecordingNavigator::default());

        let (state, snapshot) = run_to_end(store.clone(), nav.clone(), config()).await;

        assert_eq!(state, PollState::TimedOut);
        assert_eq!(store.calls(), 10);
        assert_eq!(snapshot.attempt, 10);
        assert_eq!(snapshot.progress_percent(), 100);
        let history = nav.history();
        assert_eq!(
            history,
            vec![Route::PaymentPending {
                order_id: OrderId::new("77")
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hung_request_counts_as_an_error() {
        let store = ScriptedStore::new(vec![Reply::Hang, approved()]);
        let nav = Arc::new(RecordingNavigator::default());

        let (state, _) = run_to_end(store.clone(), nav.clone(), config()).await;

        assert_eq!(state, PollState::Succeeded);
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_never_exceed_max_attempts() {
        for errors_every in 1..=4u32 {
            let replies = (0..40)
                .map(|i| if i % errors_every == 0 { Reply::NetworkError } else { pending() })
                .collect();
            let store = ScriptedStore::new(replies);
            let nav = Arc::new(RecordingNavigator::default());
            let config = PollerConfig {
                max_attempts: 7,
                ..PollerConfig::default()
            };

            let (state, _) = run_to_end(store.clone(), nav.clone(), config).await;

            assert!(store.calls() <= 7, "{} fetches for pattern {}", store.calls(), errors_every);
            assert_ne!(state, PollState::Succeeded);
            assert!(!nav.history().iter().any(|r| matches!(r, Route::PaymentSuccess { .. })));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_between_ticks_stops_everything() {
        let store = ScriptedStore::new(Vec::new());
        let nav = Arc::new(RecordingNavigator::default());
        let id = OrderId::new("77");
        let poller = PaymentPoller::new(store.clone(), nav.clone(), config());
        let (guard, live) = MountGuard::new();
        let (tx, rx) = watch::channel(PollSession::new(id.clone()).snapshot(&config()));

        let task = tokio::spawn(async move { poller.run(id, live, tx).await });

        // ticks fire at 1s and 9s; unmount while waiting for the third
        tokio::time::sleep(Duration::from_secs(10)).await;
        guard.unmount();
        let state = task.await.unwrap();

        assert_eq!(state, PollState::Aborted);
        assert_eq!(store.calls(), 2);
        assert_eq!(rx.borrow().state, PollState::Aborted);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.calls(), 2);
        assert!(nav.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_during_fetch_suppresses_navigation() {
        let store = ScriptedStore::new(vec![Reply::Hang]);
        let nav = Arc::new(RecordingNavigator::default());
        let id = OrderId::new("77");
        let poller = PaymentPoller::new(store.clone(), nav.clone(), config());
        let (guard, live) = MountGuard::new();
        let (tx, _rx) = watch::channel(PollSession::new(id.clone()).snapshot(&config()));

        let task = tokio::spawn(async move { poller.run(id, live, tx).await });

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.calls(), 1);
        drop(guard);

        assert_eq!(task.await.unwrap(), PollState::Aborted);
        assert!(nav.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn straggling_success_does_not_navigate_again() {
        let store = ScriptedStore::new(vec![approved()]);
        let nav = Arc::new(RecordingNavigator::default());
        let id = OrderId::new("77");
        nav.inner.navigate(Route::PaymentSuccess { order_id: id.clone() });

        let (state, _) = run_to_end(store, nav.clone(), config()).await;

        assert_eq!(state, PollState::Succeeded);
        assert!(nav.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn detached_navigator_suppresses_a_conclusion_in_flight() {
        let store = ScriptedStore::new(vec![approved()]);
        let id = OrderId::new("77");
        let session_nav = Arc::new(SessionNavigator::new());
        session_nav.navigate(Route::PaymentProcessing { order_id: id.clone() });
        let mounted = Arc::new(MountedNavigator::new(session_nav.clone()));
        let poller = PaymentPoller::new(store.clone(), mounted.clone(), config());
        let (_guard, live) = MountGuard::new();
        let (tx, _rx) = watch::channel(PollSession::new(id.clone()).snapshot(&config()));

        let task = tokio::spawn(async move { poller.run(id, live, tx).await });

        // The guard stays mounted, so the poller's own liveness checks pass.
        tokio::time::sleep(Duration::from_millis(500)).await;
        mounted.detach();
        session_nav.navigate(Route::Shop);

        assert_eq!(task.await.unwrap(), PollState::Succeeded);
        assert_eq!(store.calls(), 1);
        assert_eq!(session_nav.current(), Some(Route::Shop));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_request_is_recorded_as_an_error() {
        let store = ScriptedStore::new(vec![Reply::Hang, Reply::Hang]);
        let nav = Arc::new(RecordingNavigator::default());
        let id = OrderId::new("77");
        let poller = PaymentPoller::new(store.clone(), nav.clone(), config());
        let (guard, live) = MountGuard::new();
        let (tx, rx) = watch::channel(PollSession::new(id.clone()).snapshot(&config()));

        let task = tokio::spawn(async move { poller.run(id, live, tx).await });

        // first fetch at 1s, given up at 11s
        tokio::time::sleep(Duration::from_millis(11_500)).await;
        {
            let progress = rx.borrow();
            assert_eq!(progress.attempt, 1);
            assert_eq!(progress.consecutive_errors, 1);
            assert_eq!(progress.state, PollState::Polling);
        }

        drop(guard);
        assert_eq!(task.await.unwrap(), PollState::Aborted);
    }
}
