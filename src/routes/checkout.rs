//! Checkout route.
//!
//! POST /sessions/{sid}/checkout - Create the order and the payment redirect

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json, Router};

use crate::error::Result;
use crate::flow::navigation::{Navigator, Route};
use crate::flow::CheckoutStarted;
use crate::models::{ApiResponse, CheckoutRequest};
use crate::AppState;

/// Build the checkout router.
pub fn router() -> Router {
    Router::new().route("/sessions/{sid}/checkout", post(start_checkout))
}

/// Run the checkout initiator on the session cart. On success the session
/// moves to the processing page; the caller opens `redirect_url` separately.
async fn start_checkout(
    Extension(state): Extension<AppState>,
    Path(sid): Path<String>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutStarted>>)> {
    let session = state.sessions.get(&sid).await?;
    let items = session.cart().await;

    let started = state
        .checkout
        .start(session.id(), &items, req.shipping, req.saved_address.as_ref())
        .await?;

    session.navigator().navigate(Route::PaymentProcessing {
        order_id: started.order_id.clone(),
    });

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: started,
            message: "Redirect to the payment gateway to complete the payment".to_string(),
        }),
    ))
}
