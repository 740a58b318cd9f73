//! Order store backed by the storefront REST backend.
//!
//! POST {backend}/api/orders      - create an order from a cart snapshot
//! GET  {backend}/api/orders/{id} - read an order with its current statuses

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, instrument};

use super::error_message;
use crate::error::{CheckoutError, Result};
use crate::models::{NewOrder, Order, OrderEnvelope, OrderId};

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, order: &NewOrder) -> Result<Order>;
    async fn get_order(&self, order_id: &OrderId) -> Result<Order>;
}

#[derive(Clone)]
pub struct HttpOrderStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrderStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl OrderStore for HttpOrderStore {
    #[instrument(skip(self, order), fields(total = order.total, items = order.items.len()))]
    async fn create_order(&self, order: &NewOrder) -> Result<Order> {
        let response = self
            .client
            .post(format!("{}/api/orders", self.base_url))
            .json(order)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = error_message(response).await;
            return Err(CheckoutError::OrderCreation(format!("{} ({})", message, status)));
        }

        let envelope: OrderEnvelope = response.json().await?;
        info!(order_id = %envelope.order.id, "Order created");
        Ok(envelope.order)
    }

    #[instrument(skip(self))]
    async fn get_order(&self, order_id: &OrderId) -> Result<Order> {
        let response = self
            .client
            .get(format!("{}/api/orders/{}", self.base_url, order_id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CheckoutError::OrderNotFound(order_id.clone()));
        }
        if !response.status().is_success() {
            let (status, body) = error_message(response).await;
            return Err(CheckoutError::Backend { status, body });
        }

        let envelope: OrderEnvelope = response.json().await?;
        Ok(envelope.order)
    }
}
