//! # Storefront Checkout Service
//!
//! Serves the checkout flow of the storefront: cart, order creation, the
//! payment gateway redirect, payment status polling and the outcome pages.
//!
//! ## Architecture
//!
//! - Axum handles HTTP routing and request/response lifecycle
//! - reqwest talks to the storefront backend (orders and payment links)
//! - One poller task per session watches the order after the redirect

use tracing::info;

use storefront_checkout::config::AppConfig;
use storefront_checkout::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_checkout=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting storefront checkout service");

    let config = AppConfig::from_env()?;
    let state = AppState::from_config(&config)?;
    info!(
        pending_orders = %config.pending_orders_path.display(),
        "Backend clients ready"
    );

    let app = create_app(state);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
