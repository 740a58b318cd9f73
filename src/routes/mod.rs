//! HTTP route modules for the storefront checkout service.
//!
//! - `cart`: sessions and their carts
//! - `checkout`: order creation and payment redirect
//! - `payments`: payment processing page (poller mount, unmount, escape)
//! - `outcomes`: success, pending and failure pages

pub mod cart;
pub mod checkout;
pub mod outcomes;
pub mod payments;

use crate::error::{CheckoutError, Result};
use crate::models::OrderId;

/// Parse an `order_id` query value. Blank counts as absent.
fn order_id_param(raw: Option<&str>) -> Option<OrderId> {
    raw.map(str::trim).filter(|id| !id.is_empty()).map(OrderId::new)
}

fn require_order_id(raw: Option<&str>) -> Result<OrderId> {
    order_id_param(raw).ok_or_else(|| CheckoutError::Validation("order_id is required".to_string()))
}
