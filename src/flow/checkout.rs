//! # Checkout Initiator
//!
//! Turns a cart and a shipping form into a backend order plus a gateway
//! redirect.
//!
//! 1. Validate the cart and the shipping form (nothing is sent if invalid)
//! 2. Create the order, or reuse the session's pending order for the same
//!    snapshot when it is still undecided
//! 3. Persist the pending order marker
//! 4. Request the payment link for the order
//!
//! A failed order creation never reaches the gateway. A failed payment link
//! leaves the order pending and the marker in place, so the next attempt
//! reuses the same order instead of creating a duplicate.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::cart::{validate_items, CartTotals, ShippingRule};
use crate::clients::{OrderStore, PaymentGateway};
use crate::error::{CheckoutError, Result};
use crate::flow::navigation::Route;
use crate::models::{
    CartItem, CheckoutSnapshot, CustomerInfo, NewOrder, OrderId, PaymentLinkRequest, PaymentSignal,
    PendingOrder, SavedAddress, ShippingForm,
};
use crate::pending::PendingOrderStore;

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutStarted {
    pub order_id: OrderId,
    /// Gateway page to open in a new browsing context.
    pub redirect_url: String,
    /// Local route to move to while the gateway page is open.
    pub processing_route: String,
    pub reused_order: bool,
    pub totals: CartTotals,
}

pub struct CheckoutInitiator {
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    pending: Arc<dyn PendingOrderStore>,
    shipping_rule: ShippingRule,
}

impl CheckoutInitiator {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        pending: Arc<dyn PendingOrderStore>,
        shipping_rule: ShippingRule,
    ) -> Self {
        Self {
            orders,
            gateway,
            pending,
            shipping_rule,
        }
    }

    #[instrument(skip(self, items, form, saved_address), fields(items = items.len()))]
    pub async fn start(
        &self,
        session_id: &str,
        items: &[CartItem],
        form: ShippingForm,
        saved_address: Option<&SavedAddress>,
    ) -> Result<CheckoutStarted> {
        validate_items(items)?;
        let form = match saved_address {
            Some(saved) => form.prefill_from(saved),
            None => form,
        };
        form.validate().map_err(CheckoutError::Validation)?;

        let snapshot = CheckoutSnapshot {
            items: items.to_vec(),
            customer: CustomerInfo::from(&form),
            totals: CartTotals::compute(items, self.shipping_rule),
        };

        let (order_id, reused_order) = match self.reusable_order(session_id, &snapshot).await? {
            Some(order_id) => (order_id, true),
            None => (self.create_order(session_id, &snapshot).await?, false),
        };

        let request = PaymentLinkRequest {
            amount: snapshot.totals.total,
            order_id: order_id.clone(),
            customer_email: snapshot.customer.email.clone(),
            customer_name: snapshot.customer.name.clone(),
            items: snapshot.items.clone(),
        };
        let link = self.gateway.create_payment_link(&request).await.map_err(|e| {
            error!(%order_id, "Payment link creation failed: {}", e);
            match e {
                CheckoutError::PaymentLink { .. } => e,
                other => CheckoutError::PaymentLink {
                    order_id: order_id.clone(),
                    reason: other.to_string(),
                },
            }
        })?;

        info!(%order_id, reused_order, "Checkout started, redirecting to gateway");
        Ok(CheckoutStarted {
            processing_route: Route::PaymentProcessing {
                order_id: order_id.clone(),
            }
            .path(),
            order_id,
            redirect_url: link.redirect_url,
            reused_order,
            totals: snapshot.totals,
        })
    }

    /// The session's pending order, if it was created from this exact
    /// snapshot and its payment is still undecided.
    async fn reusable_order(&self, session_id: &str, snapshot: &CheckoutSnapshot) -> Result<Option<OrderId>> {
        let Some(marker) = self.pending.load(session_id).await? else {
            return Ok(None);
        };
        if marker.snapshot != *snapshot {
            return Ok(None);
        }

        let order = match self.orders.get_order(&marker.order_id).await {
            Ok(order) => order,
            Err(CheckoutError::OrderNotFound(_)) => {
                warn!(order_id = %marker.order_id, "Pending order no longer exists");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match order.payment_signal() {
            PaymentSignal::Undecided => {
                info!(order_id = %order.id, "Reusing pending order for retry");
                Ok(Some(order.id))
            }
            PaymentSignal::Failure => {
                info!(order_id = %order.id, "Previous payment failed, creating a new order");
                Ok(None)
            }
            PaymentSignal::Success => Err(CheckoutError::AlreadyPaid(order.id)),
        }
    }

    async fn create_order(&self, session_id: &str, snapshot: &CheckoutSnapshot) -> Result<OrderId> {
        let new_order = NewOrder {
            customer_info: snapshot.customer.clone(),
            items: snapshot.items.clone(),
            subtotal: snapshot.totals.subtotal,
            shipping: snapshot.totals.shipping,
            total: snapshot.totals.total,
        };

        let order = self.orders.create_order(&new_order).await.map_err(|e| {
            error!("Failed to create order: {}", e);
            match e {
                CheckoutError::OrderCreation(_) => e,
                other => CheckoutError::OrderCreation(other.to_string()),
            }
        })?;

        self.pending
            .save(
                session_id,
                &PendingOrder {
                    order_id: order.id.clone(),
                    snapshot: snapshot.clone(),
                    created_at: Utc::now(),
                },
            )
            .await?;

        Ok(order.id)
    }
}
