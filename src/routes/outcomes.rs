//! Outcome page routes.
//!
//! GET /sessions/{sid}/payment-success?order_id= - Receipt, clears the cart once
//! GET /payment-pending?order_id=                - Could not confirm yet
//! GET /payment-failure?order_id=&error=         - Payment was not processed

use axum::extract::{Path, Query};
use axum::routing::get;
use axum::{Extension, Json, Router};
use tracing::{info, warn};

use super::{order_id_param, require_order_id};
use crate::error::Result;
use crate::flow::navigation::{navigate_once, Route};
use crate::flow::outcome::{fetch_receipt, FailurePage, FailureReason, PendingPage, SuccessPage};
use crate::models::{ApiResponse, OrderQuery, PaymentSignal};
use crate::AppState;

/// Build the outcome pages router.
pub fn router() -> Router {
    Router::new()
        .route("/sessions/{sid}/payment-success", get(success_page))
        .route("/payment-pending", get(pending_page))
        .route("/payment-failure", get(failure_page))
}

async fn success_page(
    Extension(state): Extension<AppState>,
    Path(sid): Path<String>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<ApiResponse<SuccessPage>>> {
    let session = state.sessions.get(&sid).await?;
    let order_id = require_order_id(query.order_id.as_deref())?;

    // Arriving here leaves the processing page.
    session.unmount_poller().await;
    navigate_once(
        session.navigator(),
        &order_id,
        Route::PaymentSuccess {
            order_id: order_id.clone(),
        },
    );

    // Cleared on arrival, before the receipt confirms anything. A manual
    // "continue" on an unconfirmed order lands here too and still empties
    // the cart; only `printable` and the marker wait for confirmation.
    let cart_cleared = session.clear_cart_once(&order_id).await;
    let order = fetch_receipt(state.orders.as_ref(), &order_id, &state.receipt).await;

    match &order {
        Some(order) if order.payment_signal() == PaymentSignal::Success => {
            if let Err(e) = state.pending.clear(session.id()).await {
                warn!(session_id = %session.id(), "Could not clear pending order marker: {}", e);
            }
        }
        Some(_) => info!(%order_id, "Success page shown before the backend confirmed the payment"),
        None => warn!(%order_id, "Receipt unavailable after retries"),
    }

    Ok(Json(ApiResponse {
        data: SuccessPage::new(order_id, order.as_ref(), cart_cleared),
        message: "Payment confirmed".to_string(),
    }))
}

async fn pending_page(Query(query): Query<OrderQuery>) -> Json<ApiResponse<PendingPage>> {
    Json(ApiResponse {
        data: PendingPage::new(order_id_param(query.order_id.as_deref())),
        message: "Payment still being confirmed".to_string(),
    })
}

async fn failure_page(Query(query): Query<OrderQuery>) -> Json<ApiResponse<FailurePage>> {
    let reason = FailureReason::parse(query.error.as_deref());
    Json(ApiResponse {
        data: FailurePage::new(order_id_param(query.order_id.as_deref()), reason),
        message: "Payment not processed".to_string(),
    })
}
