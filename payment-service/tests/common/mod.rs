use async_trait::async_trait;
use mongodb::bson::DateTime;
use payment_service::config::{Config, DatabaseConfig, PaytrConfig, ServerConfig};
use payment_service::models::{Order, OrderItem, PaymentRecord, PaymentStatus};
use payment_service::services::store::{
    OrderStore, PaymentOutcome, ProductCatalog, ReconcileResult,
};
use payment_service::{router, AppState};
use secrecy::Secret;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_MERCHANT_ID: &str = "123456";
pub const TEST_MERCHANT_KEY: &str = "test-merchant-key";
pub const TEST_MERCHANT_SALT: &str = "test-merchant-salt";

/// In-memory order store used by integration tests so the suite runs
/// without a live MongoDB. Mirrors the conditional-update semantics of the
/// production repository.
#[derive(Default)]
pub struct InMemoryOrderStore {
    pub orders: Mutex<HashMap<String, Order>>,
    pub items: Mutex<Vec<OrderItem>>,
    pub payments: Mutex<HashMap<String, PaymentRecord>>,
    /// When set, the next item insert fails, simulating a partial write.
    pub fail_item_insert: AtomicBool,
}

impl InMemoryOrderStore {
    /// Test-side synchronous lookup, panicking when the order is absent.
    pub fn get_order_sync(&self, order_id: &str) -> Order {
        self.orders
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .expect("order missing from store")
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_order(&self, order: Order) -> anyhow::Result<()> {
        self.orders
            .lock()
            .unwrap()
            .insert(order.order_id.clone(), order);
        Ok(())
    }

    async fn insert_order_items(&self, items: Vec<OrderItem>) -> anyhow::Result<()> {
        if self.fail_item_insert.load(Ordering::SeqCst) {
            anyhow::bail!("simulated item insert failure");
        }
        self.items.lock().unwrap().extend(items);
        Ok(())
    }

    async fn delete_order(&self, order_id: &str) -> anyhow::Result<()> {
        self.orders.lock().unwrap().remove(order_id);
        self.items
            .lock()
            .unwrap()
            .retain(|item| item.order_id != order_id);
        Ok(())
    }

    async fn insert_payment_record(&self, record: PaymentRecord) -> anyhow::Result<()> {
        self.payments
            .lock()
            .unwrap()
            .insert(record.merchant_oid.clone(), record);
        Ok(())
    }

    async fn mark_order_failed(&self, order_id: &str, reason: &str) -> anyhow::Result<()> {
        if let Some(order) = self.orders.lock().unwrap().get_mut(order_id) {
            order.status = payment_service::models::OrderStatus::Failed;
            order.payment_status = PaymentStatus::Failed;
            order.failed_reason = Some(reason.to_string());
            order.updated_at = DateTime::now();
        }
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> anyhow::Result<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(order_id).cloned())
    }

    async fn get_order_items(&self, order_id: &str) -> anyhow::Result<Vec<OrderItem>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn get_payment_record(&self, order_id: &str) -> anyhow::Result<Option<PaymentRecord>> {
        Ok(self.payments.lock().unwrap().get(order_id).cloned())
    }

    async fn finalize_payment(
        &self,
        order_id: &str,
        outcome: PaymentOutcome,
    ) -> anyhow::Result<ReconcileResult> {
        let mut orders = self.orders.lock().unwrap();
        let Some(order) = orders.get_mut(order_id) else {
            return Ok(ReconcileResult::NotFound);
        };
        if order.payment_status.is_terminal() {
            return Ok(ReconcileResult::AlreadyFinal);
        }

        match &outcome {
            PaymentOutcome::Success => {
                order.payment_status = PaymentStatus::Success;
                order.status = payment_service::models::OrderStatus::Processing;
            }
            PaymentOutcome::Failed { reason } => {
                order.payment_status = PaymentStatus::Failed;
                order.status = payment_service::models::OrderStatus::Failed;
                order.failed_reason = reason.clone();
            }
        }
        order.updated_at = DateTime::now();

        let record_status = order.payment_status;
        drop(orders);

        if let Some(record) = self.payments.lock().unwrap().get_mut(order_id) {
            record.status = record_status;
            record.updated_at = DateTime::now();
        }

        Ok(ReconcileResult::Applied)
    }
}

/// Fixed-price catalog for tests.
#[derive(Default)]
pub struct StaticCatalog {
    pub prices: HashMap<String, f64>,
}

impl StaticCatalog {
    pub fn with_price(mut self, product_id: &str, price: f64) -> Self {
        self.prices.insert(product_id.to_string(), price);
        self
    }
}

#[async_trait]
impl ProductCatalog for StaticCatalog {
    async fn unit_price(&self, product_id: &str) -> anyhow::Result<Option<f64>> {
        Ok(self.prices.get(product_id).copied())
    }
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryOrderStore>,
    pub gateway: MockServer,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(StaticCatalog::default(), true).await
    }

    pub async fn spawn_with(catalog: StaticCatalog, configured: bool) -> Self {
        let gateway = MockServer::start().await;

        let paytr = if configured {
            PaytrConfig {
                merchant_id: TEST_MERCHANT_ID.to_string(),
                merchant_key: Secret::new(TEST_MERCHANT_KEY.to_string()),
                merchant_salt: Secret::new(TEST_MERCHANT_SALT.to_string()),
                test_mode: true,
                api_base_url: gateway.uri(),
                iframe_base_url: "https://www.paytr.com/odeme/guvenli".to_string(),
                ok_url: "https://mumdeco.com/payment/success".to_string(),
                fail_url: "https://mumdeco.com/payment/failure".to_string(),
                timeout_secs: 5,
            }
        } else {
            PaytrConfig {
                merchant_id: String::new(),
                merchant_key: Secret::new(String::new()),
                merchant_salt: Secret::new(String::new()),
                test_mode: true,
                api_base_url: gateway.uri(),
                iframe_base_url: "https://www.paytr.com/odeme/guvenli".to_string(),
                ok_url: "https://mumdeco.com/payment/success".to_string(),
                fail_url: "https://mumdeco.com/payment/failure".to_string(),
                timeout_secs: 5,
            }
        };

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: Secret::new("mongodb://unused".to_string()),
                db_name: "unused".to_string(),
            },
            paytr,
            service_name: "payment-service-test".to_string(),
        };

        let store = Arc::new(InMemoryOrderStore::default());
        let state = AppState::new(config, store.clone(), Arc::new(catalog));
        let app = router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        TestApp {
            address: format!("http://127.0.0.1:{}", port),
            store,
            gateway,
            client: reqwest::Client::new(),
        }
    }

    /// Mount a gateway mock that grants a token.
    pub async fn mock_token_success(&self, token: &str) {
        Mock::given(method("POST"))
            .and(path("/get-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "token": token,
            })))
            .mount(&self.gateway)
            .await;
    }

    /// Mount a gateway mock that rejects the token request.
    pub async fn mock_token_failure(&self, reason: &str) {
        Mock::given(method("POST"))
            .and(path("/get-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "failed",
                "reason": reason,
            })))
            .mount(&self.gateway)
            .await;
    }

    pub fn valid_create_body() -> serde_json::Value {
        serde_json::json!({
            "items": [
                { "name": "Lavender Candle", "price": 150.00, "quantity": 2 }
            ],
            "customer": {
                "email": "a@b.com",
                "name": "Ada Lovelace",
                "phone": "5551234567"
            }
        })
    }
}
