//! MongoDB bindings for the order store and product catalog.

use crate::models::{Order, OrderItem, PaymentRecord, PaymentStatus};
use crate::services::store::{OrderStore, PaymentOutcome, ProductCatalog, ReconcileResult};
use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::options::IndexOptions;
use mongodb::{bson::doc, Collection, Database, IndexModel};
use serde::Deserialize;

#[derive(Clone)]
pub struct OrderRepository {
    orders: Collection<Order>,
    order_items: Collection<OrderItem>,
    payments: Collection<PaymentRecord>,
}

impl OrderRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            orders: db.collection("orders"),
            order_items: db.collection("order_items"),
            payments: db.collection("payments"),
        }
    }

    pub async fn init_indexes(&self) -> Result<()> {
        let items_by_order = IndexModel::builder()
            .keys(doc! { "order_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("order_items_order_idx".to_string())
                    .build(),
            )
            .build();

        self.order_items.create_index(items_by_order, None).await?;

        let orders_by_user = IndexModel::builder()
            .keys(doc! { "user_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("orders_user_idx".to_string())
                    .build(),
            )
            .build();

        self.orders.create_index(orders_by_user, None).await?;

        tracing::info!("payment service indexes initialized");
        Ok(())
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn insert_order(&self, order: Order) -> Result<()> {
        self.orders.insert_one(order, None).await?;
        Ok(())
    }

    async fn insert_order_items(&self, items: Vec<OrderItem>) -> Result<()> {
        self.order_items.insert_many(items, None).await?;
        Ok(())
    }

    async fn delete_order(&self, order_id: &str) -> Result<()> {
        self.orders.delete_one(doc! { "_id": order_id }, None).await?;
        // Clear any item rows a partial insert_many left behind.
        self.order_items
            .delete_many(doc! { "order_id": order_id }, None)
            .await?;
        Ok(())
    }

    async fn insert_payment_record(&self, record: PaymentRecord) -> Result<()> {
        self.payments.insert_one(record, None).await?;
        Ok(())
    }

    async fn mark_order_failed(&self, order_id: &str, reason: &str) -> Result<()> {
        let update = doc! {
            "$set": {
                "status": "failed",
                "payment_status": "failed",
                "failed_reason": reason,
                "updated_at": mongodb::bson::DateTime::now(),
            }
        };
        self.orders
            .update_one(doc! { "_id": order_id }, update, None)
            .await?;
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        let order = self.orders.find_one(doc! { "_id": order_id }, None).await?;
        Ok(order)
    }

    async fn get_order_items(&self, order_id: &str) -> Result<Vec<OrderItem>> {
        let cursor = self
            .order_items
            .find(doc! { "order_id": order_id }, None)
            .await?;
        let items: Vec<OrderItem> = cursor.try_collect().await?;
        Ok(items)
    }

    async fn get_payment_record(&self, order_id: &str) -> Result<Option<PaymentRecord>> {
        let record = self
            .payments
            .find_one(doc! { "_id": order_id }, None)
            .await?;
        Ok(record)
    }

    async fn finalize_payment(
        &self,
        order_id: &str,
        outcome: PaymentOutcome,
    ) -> Result<ReconcileResult> {
        // Conditional on payment_status still being "waiting": concurrent
        // duplicate callbacks race on this filter and only one applies.
        let filter = doc! { "_id": order_id, "payment_status": "waiting" };
        let now = mongodb::bson::DateTime::now();

        let (update, record_status) = match &outcome {
            PaymentOutcome::Success => (
                doc! {
                    "$set": {
                        "payment_status": "success",
                        "status": "processing",
                        "updated_at": now,
                    }
                },
                PaymentStatus::Success,
            ),
            PaymentOutcome::Failed { reason } => (
                doc! {
                    "$set": {
                        "payment_status": "failed",
                        "status": "failed",
                        "failed_reason": reason.clone().unwrap_or_default(),
                        "updated_at": now,
                    }
                },
                PaymentStatus::Failed,
            ),
        };

        let applied = self
            .orders
            .find_one_and_update(filter, update, None)
            .await?;

        match applied {
            Some(_) => {
                let record_update = doc! {
                    "$set": {
                        "status": mongodb::bson::to_bson(&record_status)?,
                        "updated_at": now,
                    }
                };
                self.payments
                    .update_one(doc! { "_id": order_id }, record_update, None)
                    .await?;
                Ok(ReconcileResult::Applied)
            }
            None => match self.get_order(order_id).await? {
                Some(_) => Ok(ReconcileResult::AlreadyFinal),
                None => Ok(ReconcileResult::NotFound),
            },
        }
    }
}

/// Catalog product row as the payment core sees it: id and price only.
#[derive(Debug, Deserialize)]
struct ProductPrice {
    #[allow(dead_code)]
    #[serde(rename = "_id")]
    id: String,
    price: f64,
}

#[derive(Clone)]
pub struct CatalogRepository {
    products: Collection<ProductPrice>,
}

impl CatalogRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            products: db.collection("products"),
        }
    }
}

#[async_trait]
impl ProductCatalog for CatalogRepository {
    async fn unit_price(&self, product_id: &str) -> Result<Option<f64>> {
        let product = self
            .products
            .find_one(doc! { "_id": product_id }, None)
            .await?;
        Ok(product.map(|p| p.price))
    }
}
