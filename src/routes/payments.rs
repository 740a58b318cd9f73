//! Payment processing page routes.
//!
//! GET    /sessions/{sid}/payment-processing         - Mount or observe the poller
//! DELETE /sessions/{sid}/payment-processing         - Unmount the poller
//! GET    /sessions/{sid}/payment-processing/status  - Observe without mounting
//! POST   /sessions/{sid}/payment-processing/escape  - Leave the page manually

use axum::extract::{Path, Query};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use tracing::info;

use super::order_id_param;
use crate::error::{CheckoutError, Result};
use crate::flow::navigation::{Navigator, Route};
use crate::flow::PollSnapshot;
use crate::models::{ApiResponse, EscapeRequest, EscapeTarget, OrderQuery};
use crate::AppState;

/// The "my payment was approved, continue" button only shows after this many checks.
const MANUAL_CONFIRM_AFTER_ATTEMPTS: u32 = 10;

#[derive(Debug, Serialize)]
pub struct ProcessingView {
    pub poll: Option<PollSnapshot>,
    pub progress_percent: u8,
    /// Where the session currently is. Differs from the processing page once
    /// the poller has routed the session elsewhere.
    pub location: Option<Route>,
    pub location_path: Option<String>,
    pub manual_confirm_available: bool,
    pub escape_path: String,
}

impl ProcessingView {
    fn new(poll: Option<PollSnapshot>, location: Option<Route>) -> Self {
        Self {
            progress_percent: poll.as_ref().map_or(0, PollSnapshot::progress_percent),
            manual_confirm_available: poll
                .as_ref()
                .is_some_and(|p| !p.state.is_terminal() && p.attempt > MANUAL_CONFIRM_AFTER_ATTEMPTS),
            location_path: location.as_ref().map(Route::path),
            location,
            poll,
            escape_path: Route::Shop.path(),
        }
    }
}

/// Build the payment processing router.
pub fn router() -> Router {
    Router::new()
        .route(
            "/sessions/{sid}/payment-processing",
            get(processing_page).delete(leave_processing_page),
        )
        .route("/sessions/{sid}/payment-processing/status", get(processing_status))
        .route("/sessions/{sid}/payment-processing/escape", post(escape))
}

/// Mount the poller for the requested order. Without an `order_id` the
/// session's pending order is used; without either the session goes home.
async fn processing_page(
    Extension(state): Extension<AppState>,
    Path(sid): Path<String>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<ApiResponse<ProcessingView>>> {
    let session = state.sessions.get(&sid).await?;

    let order_id = match order_id_param(query.order_id.as_deref()) {
        Some(order_id) => Some(order_id),
        None => state.pending.load(session.id()).await?.map(|marker| marker.order_id),
    };

    let Some(order_id) = order_id else {
        info!(session_id = %session.id(), "No order to watch, going home");
        session.navigator().navigate(Route::Home);
        return Ok(Json(ApiResponse {
            data: ProcessingView::new(None, session.navigator().current()),
            message: "No order to check".to_string(),
        }));
    };

    let snapshot = session
        .mount_poller(order_id, state.orders.clone(), state.poller.clone())
        .await;

    Ok(Json(ApiResponse {
        data: ProcessingView::new(Some(snapshot), session.navigator().current()),
        message: "Checking payment status".to_string(),
    }))
}

/// Current progress and location. Never mounts, restarts or navigates.
async fn processing_status(
    Extension(state): Extension<AppState>,
    Path(sid): Path<String>,
) -> Result<Json<ApiResponse<ProcessingView>>> {
    let session = state.sessions.get(&sid).await?;
    let poll = session.poll_snapshot().await;

    Ok(Json(ApiResponse {
        data: ProcessingView::new(poll, session.navigator().current()),
        message: "Payment status".to_string(),
    }))
}

async fn leave_processing_page(
    Extension(state): Extension<AppState>,
    Path(sid): Path<String>,
) -> Result<Json<ApiResponse<ProcessingView>>> {
    let session = state.sessions.get(&sid).await?;
    let last = session.unmount_poller().await;

    Ok(Json(ApiResponse {
        data: ProcessingView::new(last, session.navigator().current()),
        message: "Payment status checks stopped".to_string(),
    }))
}

async fn escape(
    Extension(state): Extension<AppState>,
    Path(sid): Path<String>,
    Json(req): Json<EscapeRequest>,
) -> Result<Json<ApiResponse<ProcessingView>>> {
    let session = state.sessions.get(&sid).await?;

    let destination = match req.to {
        EscapeTarget::Shop => Route::Shop,
        EscapeTarget::Success => {
            let poll = session
                .poll_snapshot()
                .await
                .ok_or_else(|| CheckoutError::Validation("No payment is being checked".to_string()))?;
            if poll.attempt <= MANUAL_CONFIRM_AFTER_ATTEMPTS {
                return Err(CheckoutError::Validation(format!(
                    "Manual confirmation is available after {} checks",
                    MANUAL_CONFIRM_AFTER_ATTEMPTS
                )));
            }
            Route::PaymentSuccess {
                order_id: poll.order_id,
            }
        }
    };

    let last = session.unmount_poller().await;
    info!(session_id = %session.id(), to = %destination.path(), "Left payment processing page manually");
    session.navigator().navigate(destination);

    Ok(Json(ApiResponse {
        data: ProcessingView::new(last, session.navigator().current()),
        message: "Left payment processing".to_string(),
    }))
}
