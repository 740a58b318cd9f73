//! Storefront sessions.
//!
//! A session stands in for one browser tab: its cart, its current route and
//! the poller mounted on its processing page. At most one poller is mounted
//! per session; mounting for another order unmounts the previous one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clients::OrderStore;
use crate::config::PollerConfig;
use crate::error::{CheckoutError, Result};
use crate::flow::navigation::{MountedNavigator, Navigator, Route, SessionNavigator};
use crate::flow::poller::{PaymentPoller, PollSession, PollSnapshot, PollState};
use crate::flow::MountGuard;
use crate::models::{CartItem, OrderId};

struct PollHandle {
    order_id: OrderId,
    guard: MountGuard,
    navigator: Arc<MountedNavigator>,
    progress: watch::Receiver<PollSnapshot>,
    task: JoinHandle<PollState>,
}

impl PollHandle {
    fn snapshot(&self) -> PollSnapshot {
        self.progress.borrow().clone()
    }

    /// Still polling, so a remount for the same order can observe it.
    fn is_running(&self) -> bool {
        !self.task.is_finished() && !self.snapshot().state.is_terminal()
    }

    /// Detach the navigator before tearing down, so a conclusion already in
    /// flight cannot route the session afterwards.
    fn unmount(&self) {
        self.navigator.detach();
        self.guard.unmount();
    }
}

pub struct Session {
    id: String,
    cart: Mutex<Vec<CartItem>>,
    navigator: Arc<SessionNavigator>,
    poll: Mutex<Option<PollHandle>>,
    cleared_orders: Mutex<HashSet<OrderId>>,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            cart: Mutex::new(Vec::new()),
            navigator: Arc::new(SessionNavigator::new()),
            poll: Mutex::new(None),
            cleared_orders: Mutex::new(HashSet::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn navigator(&self) -> &SessionNavigator {
        &self.navigator
    }

    pub async fn cart(&self) -> Vec<CartItem> {
        self.cart.lock().await.clone()
    }

    pub async fn replace_cart(&self, items: Vec<CartItem>) {
        *self.cart.lock().await = items;
    }

    /// Empty the cart the first time it is asked for `order_id`. Returns
    /// whether this call cleared it.
    pub async fn clear_cart_once(&self, order_id: &OrderId) -> bool {
        let mut cleared = self.cleared_orders.lock().await;
        if !cleared.insert(order_id.clone()) {
            return false;
        }
        self.cart.lock().await.clear();
        info!(session_id = %self.id, %order_id, "Cart cleared after successful payment");
        true
    }

    /// Mount the poller for `order_id`, or observe the one still running for
    /// it. A finished poller is replaced, so every revisit polls again.
    pub async fn mount_poller(
        &self,
        order_id: OrderId,
        orders: Arc<dyn OrderStore>,
        config: PollerConfig,
    ) -> PollSnapshot {
        let mut slot = self.poll.lock().await;
        if let Some(handle) = slot.as_ref() {
            if handle.order_id == order_id && handle.is_running() {
                return handle.snapshot();
            }
            debug!(session_id = %self.id, previous = %handle.order_id, "Replacing mounted poller");
            handle.unmount();
        }

        self.navigator.navigate(Route::PaymentProcessing {
            order_id: order_id.clone(),
        });

        let (guard, live) = MountGuard::new();
        let (tx, rx) = watch::channel(PollSession::new(order_id.clone()).snapshot(&config));
        let navigator = Arc::new(MountedNavigator::new(self.navigator.clone()));
        let poller = PaymentPoller::new(orders, navigator.clone(), config);
        let target = order_id.clone();
        let task = tokio::spawn(async move { poller.run(target, live, tx).await });

        info!(session_id = %self.id, %order_id, "Payment poller mounted");
        let handle = PollHandle {
            order_id,
            guard,
            navigator,
            progress: rx,
            task,
        };
        let snapshot = handle.snapshot();
        *slot = Some(handle);
        snapshot
    }

    /// Unmount the poller, if any. Returns its last published progress.
    pub async fn unmount_poller(&self) -> Option<PollSnapshot> {
        let handle = self.poll.lock().await.take()?;
        handle.unmount();
        let snapshot = handle.snapshot();
        if handle.task.is_finished() {
            debug!(session_id = %self.id, order_id = %handle.order_id, "Unmounted a finished poller");
        }
        Some(snapshot)
    }

    pub async fn poll_snapshot(&self) -> Option<PollSnapshot> {
        self.poll.lock().await.as_ref().map(PollHandle::snapshot)
    }
}

/// All live sessions, keyed by id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Arc<Session> {
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(id.clone()));
        self.sessions.write().await.insert(id, session.clone());
        session
    }

    pub async fn get(&self, id: &str) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CheckoutError::SessionNotFound(id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as CheckoutResult;
    use crate::models::{NewOrder, Order, OrderStatus, PaymentStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct AlwaysPending {
        calls: AtomicU32,
    }

    #[async_trait]
    impl OrderStore for AlwaysPending {
        async fn create_order(&self, _order: &NewOrder) -> CheckoutResult<Order> {
            unreachable!()
        }

        async fn get_order(&self, order_id: &OrderId) -> CheckoutResult<Order> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Order {
                id: order_id.clone(),
                status: OrderStatus::Pending,
                payment_status: Some(PaymentStatus::Pending),
                items: Vec::new(),
                customer_info: None,
                subtotal: 0.0,
                shipping: 0.0,
                total: 0.0,
            })
        }
    }

    fn item() -> CartItem {
        CartItem {
            id: "1-S".into(),
            product_id: 1,
            name: "Buzo".into(),
            price: 80_000.0,
            quantity: 1,
            size: Some("S".into()),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn cart_is_cleared_once_per_order() {
        let registry = SessionRegistry::new();
        let session = registry.create().await;
        session.replace_cart(vec![item()]).await;

        let id = OrderId::new("3");
        assert!(session.clear_cart_once(&id).await);
        assert!(session.cart().await.is_empty());

        session.replace_cart(vec![item()]).await;
        assert!(!session.clear_cart_once(&id).await);
        assert_eq!(session.cart().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let registry = SessionRegistry::new();
        assert!(matches!(
            registry.get("nope").await,
            Err(CheckoutError::SessionNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn remount_for_same_order_observes_existing_poller() {
        let registry = SessionRegistry::new();
        let session = registry.create().await;
        let id = OrderId::new("8");

        let first = session
            .mount_poller(id.clone(), Arc::new(AlwaysPending::default()), PollerConfig::default())
            .await;
        assert_eq!(first.attempt, 0);
        assert_eq!(
            session.navigator().current(),
            Some(Route::PaymentProcessing { order_id: id.clone() })
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        let again = session
            .mount_poller(id.clone(), Arc::new(AlwaysPending::default()), PollerConfig::default())
            .await;
        assert_eq!(again.attempt, 2);

        let last = session.unmount_poller().await.unwrap();
        assert_eq!(last.order_id, id);
        assert!(session.poll_snapshot().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn remount_after_timeout_polls_again() {
        let registry = SessionRegistry::new();
        let session = registry.create().await;
        let id = OrderId::new("8");
        let store = Arc::new(AlwaysPending::default());
        let config = PollerConfig {
            max_attempts: 2,
            ..PollerConfig::default()
        };

        session.mount_poller(id.clone(), store.clone(), config.clone()).await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.poll_snapshot().await.unwrap().state, PollState::TimedOut);
        assert_eq!(
            session.navigator().current(),
            Some(Route::PaymentPending { order_id: id.clone() })
        );

        let fresh = session.mount_poller(id.clone(), store.clone(), config).await;
        assert_eq!(fresh.state, PollState::Polling);
        assert_eq!(fresh.attempt, 0);
        assert_eq!(
            session.navigator().current(),
            Some(Route::PaymentProcessing { order_id: id })
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unmounted_poller_never_routes_the_session() {
        let registry = SessionRegistry::new();
        let session = registry.create().await;
        let id = OrderId::new("8");

        let config = PollerConfig {
            max_attempts: 1,
            ..PollerConfig::default()
        };

        session
            .mount_poller(id, Arc::new(AlwaysPending::default()), config)
            .await;
        session.unmount_poller().await;
        session.navigator().navigate(Route::Shop);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(session.navigator().current(), Some(Route::Shop));
    }
}
