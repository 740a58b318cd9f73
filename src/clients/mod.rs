//! Clients for the collaborators the checkout flow does not own.
//!
//! - `order_store`: order creation and lookup on the storefront backend
//! - `payment_gateway`: hosted checkout link creation
//!
//! Both are traits so the flow can run against scripted fakes in tests.

pub mod order_store;
pub mod payment_gateway;

pub use order_store::{HttpOrderStore, OrderStore};
pub use payment_gateway::{HttpPaymentGateway, PaymentGateway, PaymentLink};

use std::time::Duration;

use crate::error::Result;

/// Build the HTTP client shared by the backend clients.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Read an error body, preferring the backend's `message` field.
async fn error_message(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);
    (status, message)
}
