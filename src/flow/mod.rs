//! The order payment confirmation flow.
//!
//! - `checkout`: order creation and gateway redirect
//! - `poller`: payment status polling and terminal routing
//! - `outcome`: success, pending and failure view models
//! - `navigation`: storefront routes and the session navigator
//! - `liveness`: mount/unmount signalling for the poller

pub mod checkout;
pub mod liveness;
pub mod navigation;
pub mod outcome;
pub mod poller;

pub use checkout::{CheckoutInitiator, CheckoutStarted};
pub use liveness::{Liveness, MountGuard};
pub use navigation::{MountedNavigator, Navigator, Route, SessionNavigator};
pub use poller::{PaymentPoller, PollSnapshot, PollState};
