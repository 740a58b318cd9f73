//! # Outcome Pages
//!
//! View models for the three endings of a payment attempt. The pending page
//! is shown when the status could not be confirmed and never reads as a
//! failed payment.

use serde::Serialize;
use tracing::warn;

use crate::clients::OrderStore;
use crate::config::ReceiptConfig;
use crate::flow::navigation::Route;
use crate::models::{CustomerInfo, Order, OrderId, PaymentSignal};

/// One-shot receipt fetch: a fixed number of attempts with a fixed pause,
/// no backoff. `None` when every attempt failed.
pub async fn fetch_receipt(orders: &dyn OrderStore, order_id: &OrderId, config: &ReceiptConfig) -> Option<Order> {
    for attempt in 1..=config.max_attempts {
        match orders.get_order(order_id).await {
            Ok(order) => return Some(order),
            Err(e) => {
                warn!(%order_id, attempt, max_attempts = config.max_attempts, "Receipt fetch failed: {}", e);
                if attempt < config.max_attempts {
                    tokio::time::sleep(config.retry_delay).await;
                }
            }
        }
    }
    None
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptLine {
    pub name: String,
    pub size: Option<String>,
    pub quantity: u32,
    pub line_total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub order_id: OrderId,
    pub customer: Option<CustomerInfo>,
    pub lines: Vec<ReceiptLine>,
    pub subtotal: f64,
    pub shipping: f64,
    pub total: f64,
}

impl From<&Order> for Receipt {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            customer: order.customer_info.clone(),
            lines: order
                .items
                .iter()
                .map(|line| ReceiptLine {
                    name: line.name.clone(),
                    size: line.size.clone(),
                    quantity: line.quantity,
                    line_total: (line.price * f64::from(line.quantity) * 100.0).round() / 100.0,
                })
                .collect(),
            subtotal: order.subtotal,
            shipping: order.shipping,
            total: order.total,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessPage {
    pub order_id: OrderId,
    pub title: &'static str,
    pub message: &'static str,
    pub receipt: Option<Receipt>,
    /// Only a receipt whose order confirms the payment may be printed or shared.
    pub printable: bool,
    /// Whether this visit emptied the cart. Later visits report `false`.
    pub cart_cleared: bool,
    pub next_steps: Vec<&'static str>,
}

impl SuccessPage {
    pub fn new(order_id: OrderId, order: Option<&Order>, cart_cleared: bool) -> Self {
        let printable = order.is_some_and(|o| o.payment_signal() == PaymentSignal::Success);
        Self {
            order_id,
            title: "Payment successful!",
            message: "Thank you for your purchase. Your order has been confirmed.",
            receipt: order.map(Receipt::from),
            printable,
            cart_cleared,
            next_steps: vec![
                "You will receive a confirmation email with your order details.",
                "We will prepare your order and notify you when it ships.",
                "Track your order from your account at any time.",
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingPage {
    pub order_id: Option<OrderId>,
    pub title: &'static str,
    pub message: &'static str,
    pub steps: Vec<&'static str>,
    pub notice: &'static str,
    pub actions: Vec<String>,
}

impl PendingPage {
    pub fn new(order_id: Option<OrderId>) -> Self {
        Self {
            order_id,
            title: "Payment in progress",
            message: "We are still confirming your transaction. This can take a few minutes.",
            steps: vec![
                "Your payment was received and is being processed.",
                "The payment provider is confirming the funds and validating the transaction.",
                "We will email you as soon as the payment is confirmed.",
            ],
            notice: "This can take between 5 and 30 minutes. If you get no confirmation within 24 hours, contact us.",
            actions: vec![Route::Shop.path(), Route::Home.path(), "/contact".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    PaymentFailed,
    CardDeclined,
    InsufficientFunds,
}

impl FailureReason {
    /// Unknown or missing reasons read as a generic failure.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("card_declined") => FailureReason::CardDeclined,
            Some("insufficient_funds") => FailureReason::InsufficientFunds,
            _ => FailureReason::PaymentFailed,
        }
    }

    fn title(self) -> &'static str {
        match self {
            FailureReason::PaymentFailed => "Payment not processed",
            FailureReason::CardDeclined => "Card declined",
            FailureReason::InsufficientFunds => "Insufficient funds",
        }
    }

    fn description(self) -> &'static str {
        match self {
            FailureReason::PaymentFailed => {
                "We could not process your payment. This may be due to insufficient funds, incorrect details or a temporary problem with your payment method."
            }
            FailureReason::CardDeclined => "Your card was declined. Please check the details or try another payment method.",
            FailureReason::InsufficientFunds => {
                "There are not enough funds in your account. Please check your balance and try again."
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailurePage {
    pub order_id: Option<OrderId>,
    pub reason: FailureReason,
    pub title: &'static str,
    pub description: &'static str,
    pub retry_route: String,
}

impl FailurePage {
    pub fn new(order_id: Option<OrderId>, reason: FailureReason) -> Self {
        Self {
            order_id,
            reason,
            title: reason.title(),
            description: reason.description(),
            retry_route: Route::Checkout.path(),
        }
    }
}
