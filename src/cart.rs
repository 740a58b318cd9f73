//! Cart totals and cart validation.

use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};
use crate::models::CartItem;

/// Flat-rate shipping waived above a subtotal threshold.
#[derive(Debug, Clone, Copy)]
pub struct ShippingRule {
    pub free_shipping_threshold: f64,
    pub flat_shipping: f64,
}

impl Default for ShippingRule {
    fn default() -> Self {
        Self {
            free_shipping_threshold: 200_000.0,
            flat_shipping: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: f64,
    pub shipping: f64,
    pub total: f64,
    pub item_count: u64,
}

impl CartTotals {
    pub fn compute(items: &[CartItem], rule: ShippingRule) -> Self {
        let subtotal = round_cents(items.iter().map(|item| item.price * f64::from(item.quantity)).sum());
        let item_count = items.iter().map(|item| u64::from(item.quantity)).sum();
        let shipping = if items.is_empty() || subtotal > rule.free_shipping_threshold {
            0.0
        } else {
            rule.flat_shipping
        };

        Self {
            subtotal,
            shipping,
            total: round_cents(subtotal + shipping),
            item_count,
        }
    }
}

/// Upper bound on the quantity of a single cart line.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Reject carts that must never reach the backend.
pub fn validate_items(items: &[CartItem]) -> Result<()> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    for item in items {
        if item.quantity == 0 || item.quantity > MAX_LINE_QUANTITY {
            return Err(CheckoutError::Validation(format!(
                "Invalid quantity {} for product {}",
                item.quantity, item.name
            )));
        }
        if !item.price.is_finite() || item.price < 0.0 {
            return Err(CheckoutError::Validation(format!(
                "Invalid price {} for product {}",
                item.price, item.name
            )));
        }
    }

    Ok(())
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
