//! Domain and wire models for the storefront checkout service.
//!
//! Orders are owned by the backend; the types here only mirror what the
//! backend returns and what the storefront sends. Statuses are read-only on
//! this side of the wire.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::cart::CartTotals;

// ============================================================================
// Order (backend-owned)
// ============================================================================

/// Opaque order identifier. The backend emits numeric ids; anything else is
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => OrderId(n.to_string()),
            Raw::Text(s) => OrderId(s),
        })
    }
}

/// Fulfillment status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    PaymentFailed,
    #[serde(other)]
    Unknown,
}

/// Last known payment outcome as reported by the gateway through the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    InProcess,
    #[serde(other)]
    Unknown,
}

/// What a fetched order says about the payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentSignal {
    Success,
    Failure,
    Undecided,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default)]
    pub customer_info: Option<CustomerInfo>,
    #[serde(default)]
    pub subtotal: f64,
    #[serde(default)]
    pub shipping: f64,
    #[serde(default)]
    pub total: f64,
}

impl Order {
    /// Classify the order. Success signals are checked before failure signals,
    /// so an order carrying both reads as paid.
    pub fn payment_signal(&self) -> PaymentSignal {
        let payment = self.payment_status.unwrap_or_default();
        if payment == PaymentStatus::Approved
            || matches!(self.status, OrderStatus::Confirmed | OrderStatus::Paid)
        {
            PaymentSignal::Success
        } else if payment == PaymentStatus::Rejected
            || matches!(self.status, OrderStatus::Cancelled | OrderStatus::PaymentFailed)
        {
            PaymentSignal::Failure
        } else {
            PaymentSignal::Undecided
        }
    }
}

/// A line of an order as echoed back by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub size: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub postal_code: Option<String>,
}

// ============================================================================
// Cart and shipping
// ============================================================================

/// A cart line. `id` identifies the line (product + size), not the product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    #[serde(alias = "productId")]
    pub product_id: i64,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
}

/// Shipping form as submitted by the storefront. Missing fields deserialize
/// as empty so a saved address can fill them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub department: String,
    pub postal_code: Option<String>,
}

/// An address from the customer's address book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedAddress {
    pub id: i64,
    #[serde(default)]
    pub alias: String,
    pub address: String,
    pub city: String,
    pub department: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

impl ShippingForm {
    /// Fill blank fields from a saved address; fields the customer typed win.
    pub fn prefill_from(mut self, saved: &SavedAddress) -> Self {
        fn fill(field: &mut String, value: &str) {
            if field.trim().is_empty() {
                *field = value.to_string();
            }
        }

        fill(&mut self.address, &saved.address);
        fill(&mut self.city, &saved.city);
        fill(&mut self.department, &saved.department);
        if let Some(phone) = &saved.phone {
            fill(&mut self.phone, phone);
        }
        if self.postal_code.as_deref().map_or(true, |p| p.trim().is_empty()) {
            self.postal_code = saved.postal_code.clone();
        }
        self
    }

    /// Check the required fields. Postal code is optional.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("department", &self.department),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(format!("Missing shipping fields: {}", missing.join(", ")));
        }
        if !self.email.contains('@') {
            return Err(format!("Invalid email address: {}", self.email));
        }
        Ok(())
    }
}

impl From<&ShippingForm> for CustomerInfo {
    fn from(form: &ShippingForm) -> Self {
        Self {
            name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            phone: form.phone.trim().to_string(),
            address: form.address.trim().to_string(),
            city: form.city.trim().to_string(),
            department: form.department.trim().to_string(),
            postal_code: form
                .postal_code
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }
}

// ============================================================================
// Backend wire models
// ============================================================================

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub customer_info: CustomerInfo,
    pub items: Vec<CartItem>,
    pub subtotal: f64,
    pub shipping: f64,
    pub total: f64,
}

/// `{ "order": { ... } }` as returned by the order endpoints.
#[derive(Debug, Deserialize)]
pub struct OrderEnvelope {
    pub order: Order,
}

/// Body of the payment-link creation call.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentLinkRequest {
    pub amount: f64,
    pub order_id: OrderId,
    pub customer_email: String,
    pub customer_name: String,
    pub items: Vec<CartItem>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentLinkResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub sandbox_init_point: Option<String>,
    #[serde(default)]
    pub init_point: Option<String>,
    #[serde(default)]
    pub payment_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PaymentLinkResponse {
    /// Sandbox link first, then production, then the legacy field.
    pub fn redirect_url(&self) -> Option<&str> {
        [&self.sandbox_init_point, &self.init_point, &self.payment_url]
            .into_iter()
            .filter_map(|url| url.as_deref())
            .find(|url| !url.is_empty())
    }
}

// ============================================================================
// Pending order marker
// ============================================================================

/// What the order was created from. Two checkouts with equal snapshots are
/// the same purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSnapshot {
    pub items: Vec<CartItem>,
    pub customer: CustomerInfo,
    pub totals: CartTotals,
}

/// Marker persisted by the checkout initiator so a reloaded processing page
/// can recover its target order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    pub order_id: OrderId,
    pub snapshot: CheckoutSnapshot,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Request Models
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReplaceCartRequest {
    pub items: Vec<CartItem>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub shipping: ShippingForm,
    #[serde(default)]
    pub saved_address: Option<SavedAddress>,
}

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub order_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapeTarget {
    Shop,
    Success,
}

#[derive(Debug, Deserialize)]
pub struct EscapeRequest {
    pub to: EscapeTarget,
}

// ============================================================================
// Response Models
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CartResponse {
    pub items: Vec<CartItem>,
    pub totals: CartTotals,
}
