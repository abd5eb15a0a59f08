use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

/// Order fulfillment lifecycle. Independent of [`PaymentStatus`]: an order
/// can sit at `Processing` while payment is still `Waiting`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Failed,
}

/// Gateway-facing payment state, mutated only by the callback reconciler
/// (or an admin override out of this service's scope).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Waiting,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }
}

/// Customer contact snapshot captured at order time. The live profile may
/// change afterwards; the order keeps what was true at purchase.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomerSnapshot {
    pub email: String,
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
    pub ip: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Order {
    /// Natural key, also sent to the gateway as `merchant_oid`.
    /// Immutable once created.
    #[serde(rename = "_id")]
    pub order_id: String,
    /// Guest checkout leaves this unset.
    pub user_id: Option<String>,
    /// Major currency units.
    pub total_amount: f64,
    pub currency: String,
    pub customer: CustomerSnapshot,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Populated by the gateway callback on failure.
    pub failed_reason: Option<String>,
    /// Filled by fulfillment when the order ships.
    pub shipping_company: Option<String>,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Line-item snapshot: name and price frozen at purchase time, never
/// re-read from the live catalog.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OrderItem {
    pub order_id: String,
    pub product_id: Option<String>,
    pub name: String,
    /// Major currency units per unit.
    pub unit_price: f64,
    pub quantity: u32,
}

/// Gateway session record, one-to-one with an [`Order`] via `merchant_oid`.
/// Created only after a successful token response, never speculatively.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaymentRecord {
    #[serde(rename = "_id")]
    pub merchant_oid: String,
    pub token: String,
    /// Exact base64 basket sent with the token request, kept for audit.
    pub basket: String,
    pub status: PaymentStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
