//! Storefront routes and the navigator the flow drives.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::models::OrderId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Route {
    Home,
    Shop,
    Checkout,
    PaymentProcessing { order_id: OrderId },
    PaymentSuccess { order_id: OrderId },
    PaymentPending { order_id: OrderId },
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Shop => "/shop-page".to_string(),
            Route::Checkout => "/checkout".to_string(),
            Route::PaymentProcessing { order_id } => format!("/payment-processing?order_id={}", order_id),
            Route::PaymentSuccess { order_id } => format!("/payment-success?order_id={}", order_id),
            Route::PaymentPending { order_id } => format!("/payment-pending?order_id={}", order_id),
        }
    }

    /// Whether this route is an outcome page for `order_id`.
    pub fn is_outcome_for(&self, order_id: &OrderId) -> bool {
        match self {
            Route::PaymentSuccess { order_id: id } | Route::PaymentPending { order_id: id } => id == order_id,
            _ => false,
        }
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
    fn current(&self) -> Option<Route>;
}

/// Navigate unless the user already sits on an outcome page for the same
/// order. Returns whether a navigation happened.
pub fn navigate_once(navigator: &dyn Navigator, order_id: &OrderId, route: Route) -> bool {
    if let Some(current) = navigator.current() {
        if current == route || current.is_outcome_for(order_id) {
            debug!(current = %current.path(), skipped = %route.path(), "Already on an outcome page");
            return false;
        }
    }
    navigator.navigate(route);
    true
}

/// Current location of one storefront session.
pub struct SessionNavigator {
    location: watch::Sender<Option<Route>>,
}

impl SessionNavigator {
    pub fn new() -> Self {
        Self {
            location: watch::Sender::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Route>> {
        self.location.subscribe()
    }
}

impl Default for SessionNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for SessionNavigator {
    fn navigate(&self, route: Route) {
        debug!(to = %route.path(), "Navigating");
        self.location.send_replace(Some(route));
    }

    fn current(&self) -> Option<Route> {
        self.location.borrow().clone()
    }
}

/// The navigator handed to a mounted poller. After [`detach`](Self::detach)
/// every navigation is dropped. The attached check and the write happen under
/// one lock, so a navigation racing a detach lands either before it or not at
/// all.
pub struct MountedNavigator {
    inner: Arc<SessionNavigator>,
    attached: Mutex<bool>,
}

impl MountedNavigator {
    pub fn new(inner: Arc<SessionNavigator>) -> Self {
        Self {
            inner,
            attached: Mutex::new(true),
        }
    }

    pub fn detach(&self) {
        *self.attached.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    pub fn is_attached(&self) -> bool {
        *self.attached.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for MountedNavigator {
    fn navigate(&self, route: Route) {
        let attached = self.attached.lock().unwrap_or_else(PoisonError::into_inner);
        if !*attached {
            debug!(skipped = %route.path(), "Poller detached, navigation dropped");
            return;
        }
        self.inner.navigate(route);
    }

    fn current(&self) -> Option<Route> {
        self.inner.current()
    }
}
