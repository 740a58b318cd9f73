//! Environment-driven configuration.
//!
//! Every timing value is read in milliseconds. Unset variables fall back to
//! the defaults of [`PollerConfig`] and [`ReceiptConfig`].

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cart::ShippingRule;
use crate::error::{CheckoutError, Result};

/// Timing and ceilings for the payment status poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Head start given to the gateway webhook before the first check.
    pub initial_delay: Duration,
    /// Pause between two checks.
    pub interval: Duration,
    pub max_attempts: u32,
    /// Extra pause per consecutive error, on top of `interval`.
    pub base_error_delay: Duration,
    pub max_error_delay: Duration,
    pub max_consecutive_errors: u32,
    /// A status fetch slower than this counts as a failed fetch.
    pub request_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            interval: Duration::from_secs(8),
            max_attempts: 60,
            base_error_delay: Duration::from_secs(2),
            max_error_delay: Duration::from_secs(16),
            max_consecutive_errors: 5,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Fixed retry for the one-shot receipt fetch on the success page.
#[derive(Debug, Clone)]
pub struct ReceiptConfig {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub backend_url: String,
    pub pending_orders_path: PathBuf,
    pub poller: PollerConfig,
    pub receipt: ReceiptConfig,
    pub shipping: ShippingRule,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let poller_defaults = PollerConfig::default();
        let poller = PollerConfig {
            initial_delay: millis_or("POLL_INITIAL_DELAY_MS", poller_defaults.initial_delay)?,
            interval: millis_or("POLL_INTERVAL_MS", poller_defaults.interval)?,
            max_attempts: parse_or("POLL_MAX_ATTEMPTS", poller_defaults.max_attempts)?,
            base_error_delay: millis_or("POLL_BASE_ERROR_DELAY_MS", poller_defaults.base_error_delay)?,
            max_error_delay: millis_or("POLL_MAX_ERROR_DELAY_MS", poller_defaults.max_error_delay)?,
            max_consecutive_errors: parse_or(
                "POLL_MAX_CONSECUTIVE_ERRORS",
                poller_defaults.max_consecutive_errors,
            )?,
            request_timeout: millis_or("REQUEST_TIMEOUT_MS", poller_defaults.request_timeout)?,
        };
        if poller.max_attempts == 0 || poller.max_consecutive_errors == 0 {
            return Err(CheckoutError::Config(
                "POLL_MAX_ATTEMPTS and POLL_MAX_CONSECUTIVE_ERRORS must be at least 1".to_string(),
            ));
        }

        let receipt_defaults = ReceiptConfig::default();
        let receipt = ReceiptConfig {
            max_attempts: parse_or("RECEIPT_MAX_ATTEMPTS", receipt_defaults.max_attempts)?,
            retry_delay: millis_or("RECEIPT_RETRY_DELAY_MS", receipt_defaults.retry_delay)?,
        };

        let shipping_defaults = ShippingRule::default();
        let shipping = ShippingRule {
            free_shipping_threshold: parse_or(
                "FREE_SHIPPING_THRESHOLD",
                shipping_defaults.free_shipping_threshold,
            )?,
            flat_shipping: parse_or("FLAT_SHIPPING", shipping_defaults.flat_shipping)?,
        };

        let config = Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:3001".to_string())
                .trim_end_matches('/')
                .to_string(),
            pending_orders_path: env::var("PENDING_ORDERS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("pending_orders.json")),
            poller,
            receipt,
            shipping,
        };

        tracing::info!(backend_url = %config.backend_url, "Configuration loaded");
        Ok(config)
    }
}

fn parse_or<T>(var: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CheckoutError::Config(format!("Invalid {}: {}", var, e))),
        Err(_) => Ok(default),
    }
}

fn millis_or(var: &str, default: Duration) -> Result<Duration> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(var, default_ms).map(Duration::from_millis)
}
