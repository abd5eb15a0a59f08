//! Checkout orchestration: turns a validated cart into a pending order and
//! a hosted-payment redirect.

use crate::dtos::{CreatePaymentData, CreatePaymentRequest};
use crate::models::{
    CustomerSnapshot, Order, OrderItem, OrderStatus, PaymentRecord, PaymentStatus,
};
use crate::services::basket::{encode_basket, to_minor_units};
use crate::services::metrics;
use crate::services::paytr::{PaytrClient, TokenRequest};
use crate::services::store::{OrderStore, ProductCatalog};
use mongodb::bson::DateTime;
use rand::distributions::Alphanumeric;
use rand::Rng;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use validator::Validate;

pub const CURRENCY: &str = "TRY";

/// Random suffix length for order ids. 22 alphanumeric characters carry
/// ~130 bits of entropy, enough for guest order lookup by id alone.
const ORDER_ID_SUFFIX_LEN: usize = 22;

#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn ProductCatalog>,
    paytr: PaytrClient,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn ProductCatalog>,
        paytr: PaytrClient,
    ) -> Self {
        Self {
            store,
            catalog,
            paytr,
        }
    }

    /// Generate a fresh order id: `ORDER` + millisecond timestamp + random
    /// alphanumeric suffix from a CSPRNG. The suffix makes guest lookup by
    /// id alone resistant to enumeration; collisions at this entropy are
    /// treated as negligible, so there is no uniqueness retry loop.
    pub fn generate_order_id() -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ORDER_ID_SUFFIX_LEN)
            .map(char::from)
            .collect();
        format!("ORDER{}{}", millis, suffix)
    }

    /// Create a payment session for a cart.
    ///
    /// Fails closed before any write when gateway credentials are missing,
    /// validates the request and (for items with a product id) re-checks
    /// submitted prices against the catalog, persists Order + OrderItems
    /// with a compensating delete on partial failure, requests a token from
    /// the gateway, and records the payment session on success.
    pub async fn create_payment(
        &self,
        request: CreatePaymentRequest,
        client_ip: String,
    ) -> Result<CreatePaymentData, AppError> {
        if !self.paytr.is_configured() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "payment gateway credentials are not configured"
            )));
        }

        request.validate()?;

        self.check_catalog_prices(&request).await?;

        let order_id = Self::generate_order_id();
        let total_amount: f64 = request
            .items
            .iter()
            .map(|item| item.price * item.quantity as f64)
            .sum();

        tracing::info!(
            order_id = %order_id,
            total_amount = total_amount,
            item_count = request.items.len(),
            "creating payment session"
        );

        let now = DateTime::now();
        let order = Order {
            order_id: order_id.clone(),
            user_id: request.customer.user_id.clone(),
            total_amount,
            currency: CURRENCY.to_string(),
            customer: CustomerSnapshot {
                email: request.customer.email.clone(),
                name: request.customer.name.clone(),
                phone: request.customer.phone.clone(),
                address: request.customer.address.clone(),
                ip: client_ip.clone(),
            },
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Waiting,
            failed_reason: None,
            shipping_company: None,
            tracking_number: None,
            shipped_at: None,
            created_at: now,
            updated_at: now,
        };

        self.store
            .insert_order(order)
            .await
            .map_err(AppError::DatabaseError)?;

        let items: Vec<OrderItem> = request
            .items
            .iter()
            .map(|item| OrderItem {
                order_id: order_id.clone(),
                product_id: item.product_id.clone(),
                name: item.name.clone(),
                unit_price: item.price,
                quantity: item.quantity,
            })
            .collect();

        if let Err(e) = self.store.insert_order_items(items).await {
            // No partial orders: take the order row back out before failing.
            tracing::error!(order_id = %order_id, error = %e, "item insert failed; deleting order");
            if let Err(del_err) = self.store.delete_order(&order_id).await {
                tracing::error!(
                    order_id = %order_id,
                    error = %del_err,
                    "compensating delete failed; dangling order left behind"
                );
            }
            return Err(AppError::DatabaseError(e));
        }

        let user_basket =
            encode_basket(&request.items).map_err(AppError::InternalError)?;
        let payment_amount = to_minor_units(total_amount);

        let (ok_url, fail_url) = match &request.return_urls {
            Some(urls) => (
                urls.ok_url
                    .clone()
                    .unwrap_or_else(|| self.paytr.default_ok_url().to_string()),
                urls.fail_url
                    .clone()
                    .unwrap_or_else(|| self.paytr.default_fail_url().to_string()),
            ),
            None => (
                self.paytr.default_ok_url().to_string(),
                self.paytr.default_fail_url().to_string(),
            ),
        };

        let token_request = TokenRequest {
            merchant_oid: order_id.clone(),
            user_ip: client_ip,
            email: request.customer.email.clone(),
            user_name: request.customer.name.clone(),
            user_address: request
                .customer
                .address
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            user_phone: request.customer.phone.clone(),
            payment_amount,
            user_basket: user_basket.clone(),
            currency: CURRENCY.to_string(),
            no_installment: 0,
            max_installment: 0,
            ok_url,
            fail_url,
        };

        let token_response = match self.paytr.get_token(&token_request).await {
            Ok(resp) => resp,
            Err(e) => {
                self.fail_order(&order_id, "gateway unreachable").await;
                return Err(AppError::BadGateway(format!(
                    "payment gateway request failed: {}",
                    e
                )));
            }
        };

        if token_response.status != "success" {
            let reason = token_response
                .reason
                .unwrap_or_else(|| "unknown gateway rejection".to_string());
            tracing::warn!(order_id = %order_id, reason = %reason, "gateway rejected token request");
            self.fail_order(&order_id, &reason).await;
            metrics::record_payment_created("rejected");
            return Err(AppError::BadGateway(reason));
        }

        let token = token_response.token.ok_or_else(|| {
            AppError::BadGateway("gateway reported success without a token".to_string())
        })?;

        let record = PaymentRecord {
            merchant_oid: order_id.clone(),
            token: token.clone(),
            basket: user_basket,
            status: PaymentStatus::Waiting,
            created_at: now,
            updated_at: now,
        };
        self.store
            .insert_payment_record(record)
            .await
            .map_err(AppError::DatabaseError)?;

        metrics::record_payment_created("accepted");
        metrics::record_payment_amount(CURRENCY, payment_amount as u64);

        tracing::info!(order_id = %order_id, "payment session created");

        Ok(CreatePaymentData {
            iframe_url: self.paytr.iframe_url(&token),
            order_id,
            token,
            amount: total_amount,
            currency: CURRENCY.to_string(),
        })
    }

    /// Re-check submitted prices for items that reference a catalog product.
    /// Unknown product ids and price mismatches are validation failures with
    /// no side effects.
    async fn check_catalog_prices(&self, request: &CreatePaymentRequest) -> Result<(), AppError> {
        for item in &request.items {
            let Some(product_id) = &item.product_id else {
                continue;
            };

            let authoritative = self
                .catalog
                .unit_price(product_id)
                .await
                .map_err(AppError::DatabaseError)?
                .ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!("unknown product: {}", product_id))
                })?;

            // Compare in minor units so float noise cannot fail honest carts.
            if to_minor_units(authoritative) != to_minor_units(item.price) {
                tracing::warn!(
                    product_id = %product_id,
                    submitted = item.price,
                    authoritative = authoritative,
                    "submitted price does not match catalog"
                );
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "price mismatch for product {}",
                    product_id
                )));
            }
        }
        Ok(())
    }

    async fn fail_order(&self, order_id: &str, reason: &str) {
        if let Err(e) = self.store.mark_order_failed(order_id, reason).await {
            tracing::error!(order_id = %order_id, error = %e, "failed to mark order failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_ids_have_prefix_timestamp_and_suffix() {
        let id = CheckoutService::generate_order_id();
        assert!(id.starts_with("ORDER"));
        let rest = &id["ORDER".len()..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        assert!(digits.len() >= 13, "expected millisecond timestamp, got {id}");
        assert!(rest.len() >= 13 + ORDER_ID_SUFFIX_LEN);
        assert!(rest.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn order_ids_do_not_collide() {
        let a = CheckoutService::generate_order_id();
        let b = CheckoutService::generate_order_id();
        assert_ne!(a, b);
    }
}
