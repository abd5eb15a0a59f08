use serde::{Deserialize, Serialize};
use validator::Validate;

/// One cart line as submitted by the storefront.
///
/// When `product_id` is present the unit price is re-checked against the
/// catalog before anything is persisted; price-tampered requests are
/// rejected. Items without a `product_id` use the submitted price as-is.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CartItem {
    pub product_id: Option<String>,
    #[validate(length(min = 1, message = "item name is required"))]
    pub name: String,
    /// Major currency units per unit.
    #[validate(range(min = 0.01, message = "price must be positive"))]
    pub price: f64,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CustomerInfo {
    #[validate(email(message = "valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    pub address: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnUrls {
    pub ok_url: Option<String>,
    pub fail_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[validate(length(min = 1, message = "cart must not be empty"), nested)]
    pub items: Vec<CartItem>,
    #[validate(nested)]
    pub customer: CustomerInfo,
    pub return_urls: Option<ReturnUrls>,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentData {
    #[serde(rename = "orderId")]
    pub order_id: String,
    pub token: String,
    #[serde(rename = "iframeUrl")]
    pub iframe_url: String,
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub success: bool,
    pub data: CreatePaymentData,
}

/// Server-to-server notification body posted by the gateway.
///
/// `total_amount` arrives as a string of minor units; it participates in the
/// hash exactly as received, so it is never parsed before verification.
#[derive(Debug, Clone, Deserialize)]
pub struct PaytrCallback {
    pub merchant_oid: String,
    pub status: String,
    pub total_amount: String,
    pub hash: String,
    pub merchant_id: Option<String>,
    pub failed_reason_code: Option<String>,
    pub failed_reason_msg: Option<String>,
    pub test_mode: Option<String>,
    pub payment_type: Option<String>,
    pub currency: Option<String>,
}
