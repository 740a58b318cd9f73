//! # Storefront Checkout Library
//!
//! Exposes the Axum router and the checkout flow so integration tests can
//! create an in-process server against a mocked backend.

pub mod cart;
pub mod clients;
pub mod config;
pub mod error;
pub mod flow;
pub mod models;
pub mod pending;
pub mod routes;
pub mod sessions;

use std::sync::Arc;

use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cart::ShippingRule;
use crate::clients::{http_client, HttpOrderStore, HttpPaymentGateway, OrderStore, PaymentGateway};
use crate::config::{AppConfig, PollerConfig, ReceiptConfig};
use crate::error::Result;
use crate::flow::CheckoutInitiator;
use crate::pending::{FilePendingOrderStore, PendingOrderStore};
use crate::sessions::SessionRegistry;

/// Shared handler state, cloned into every request through `Extension`.
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderStore>,
    pub checkout: Arc<CheckoutInitiator>,
    pub pending: Arc<dyn PendingOrderStore>,
    pub sessions: Arc<SessionRegistry>,
    pub poller: PollerConfig,
    pub receipt: ReceiptConfig,
    pub shipping: ShippingRule,
}

impl AppState {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        pending: Arc<dyn PendingOrderStore>,
        poller: PollerConfig,
        receipt: ReceiptConfig,
        shipping: ShippingRule,
    ) -> Self {
        let checkout = CheckoutInitiator::new(orders.clone(), gateway, pending.clone(), shipping);
        Self {
            orders,
            checkout: Arc::new(checkout),
            pending,
            sessions: Arc::new(SessionRegistry::new()),
            poller,
            receipt,
            shipping,
        }
    }

    /// Wire the HTTP backend clients and the file-backed marker store.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = http_client(config.poller.request_timeout)?;
        let orders = Arc::new(HttpOrderStore::new(client.clone(), config.backend_url.clone()));
        let gateway = Arc::new(HttpPaymentGateway::new(client, config.backend_url.clone()));
        let pending = Arc::new(FilePendingOrderStore::new(config.pending_orders_path.clone()));

        Ok(Self::new(
            orders,
            gateway,
            pending,
            config.poller.clone(),
            config.receipt.clone(),
            config.shipping,
        ))
    }
}

/// Build the Axum router with all route modules and middleware.
///
/// This function does NOT bind a listener.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::cart::router())
        .merge(routes::checkout::router())
        .merge(routes::payments::router())
        .merge(routes::outcomes::router())
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
