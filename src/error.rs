//! Error type shared by the checkout flow and the HTTP routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::models::OrderId;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart cannot be empty")]
    EmptyCart,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Order creation failed: {0}")]
    OrderCreation(String),

    #[error("Payment link creation failed for order {order_id}: {reason}")]
    PaymentLink { order_id: OrderId, reason: String },

    #[error("Order {0} has already been paid")]
    AlreadyPaid(OrderId),

    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error("Session {0} not found")]
    SessionNotFound(String),

    #[error("Backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend request timed out")]
    Timeout,

    #[error("Pending order storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = CheckoutError> = std::result::Result<T, E>;

impl CheckoutError {
    fn status_code(&self) -> StatusCode {
        match self {
            CheckoutError::EmptyCart | CheckoutError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CheckoutError::AlreadyPaid(_) => StatusCode::CONFLICT,
            CheckoutError::OrderNotFound(_) | CheckoutError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            CheckoutError::OrderCreation(_)
            | CheckoutError::PaymentLink { .. }
            | CheckoutError::Backend { .. }
            | CheckoutError::Transport(_) => StatusCode::BAD_GATEWAY,
            CheckoutError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            CheckoutError::Storage(_) | CheckoutError::Serialization(_) | CheckoutError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for CheckoutError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Responding with error");
        }

        let mut body = json!({
            "error": status.canonical_reason().unwrap_or("error"),
            "detail": self.to_string(),
        });
        // The order survives a failed payment link so the UI can offer a retry.
        if let CheckoutError::PaymentLink { order_id, .. } | CheckoutError::AlreadyPaid(order_id) = &self {
            body["order_id"] = json!(order_id);
        }

        (status, Json(body)).into_response()
    }
}
