//! Session and cart routes.
//!
//! POST /sessions              - Open a storefront session
//! GET  /sessions/{sid}/cart   - Read the cart with its totals
//! PUT  /sessions/{sid}/cart   - Replace the cart

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use tracing::info;

use crate::cart::{validate_items, CartTotals};
use crate::error::Result;
use crate::models::{ApiResponse, CartResponse, ReplaceCartRequest, SessionResponse};
use crate::AppState;

/// Build the session and cart router.
pub fn router() -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{sid}/cart", get(get_cart).put(replace_cart))
}

async fn create_session(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<ApiResponse<SessionResponse>>) {
    let session = state.sessions.create().await;
    info!(session_id = %session.id(), "Session opened");

    (
        StatusCode::CREATED,
        Json(ApiResponse {
            data: SessionResponse {
                session_id: session.id().to_string(),
            },
            message: "Session created".to_string(),
        }),
    )
}

async fn get_cart(
    Extension(state): Extension<AppState>,
    Path(sid): Path<String>,
) -> Result<Json<ApiResponse<CartResponse>>> {
    let session = state.sessions.get(&sid).await?;
    let items = session.cart().await;
    let totals = CartTotals::compute(&items, state.shipping);

    Ok(Json(ApiResponse {
        data: CartResponse { items, totals },
        message: "Cart retrieved".to_string(),
    }))
}

/// An empty list empties the cart; a non-empty list must be checkout-ready.
async fn replace_cart(
    Extension(state): Extension<AppState>,
    Path(sid): Path<String>,
    Json(req): Json<ReplaceCartRequest>,
) -> Result<Json<ApiResponse<CartResponse>>> {
    let session = state.sessions.get(&sid).await?;
    if !req.items.is_empty() {
        validate_items(&req.items)?;
    }
    let totals = CartTotals::compute(&req.items, state.shipping);
    session.replace_cart(req.items.clone()).await;

    Ok(Json(ApiResponse {
        data: CartResponse {
            items: req.items,
            totals,
        },
        message: "Cart updated".to_string(),
    }))
}
