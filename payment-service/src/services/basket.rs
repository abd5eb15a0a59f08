//! Gateway basket encoding.
//!
//! PayTR displays the purchased lines on its hosted payment page and folds
//! the encoded basket into the token hash, so the bytes sent here must match
//! what the gateway re-derives. Line order is preserved end to end.

use crate::dtos::CartItem;
use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};

/// Convert a major-unit price into minor units (kuruş), rounding to the
/// nearest integer to dodge float representation drift.
pub fn to_minor_units(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

/// Encode cart lines as the gateway's `user_basket` token:
/// a JSON array of `[name, minor_price_string, quantity]` tuples, base64'd.
///
/// An empty cart encodes as the empty array; the orchestrator rejects empty
/// carts before ever getting here.
pub fn encode_basket(items: &[CartItem]) -> Result<String> {
    let tuples: Vec<(String, String, u32)> = items
        .iter()
        .map(|item| {
            (
                item.name.clone(),
                to_minor_units(item.price).to_string(),
                item.quantity,
            )
        })
        .collect();

    let json = serde_json::to_string(&tuples).context("failed to serialize basket")?;
    Ok(general_purpose::STANDARD.encode(json))
}

/// Decode a basket token back into `[name, minor_price, quantity]` tuples.
/// Used for audit tooling and round-trip tests.
pub fn decode_basket(encoded: &str) -> Result<Vec<(String, String, u32)>> {
    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .context("basket is not valid base64")?;
    let json = String::from_utf8(bytes).context("basket is not valid UTF-8")?;
    serde_json::from_str(&json).context("basket is not a tuple array")
}
