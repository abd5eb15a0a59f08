//! Persistence and catalog interfaces the payment core depends on.
//!
//! The production bindings live in [`super::repository`]; tests substitute
//! in-memory implementations so the core runs without a live database.

use crate::models::{Order, OrderItem, PaymentRecord};
use anyhow::Result;
use async_trait::async_trait;

/// Final outcome reported by the gateway callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success,
    Failed { reason: Option<String> },
}

/// Result of applying a callback outcome to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileResult {
    /// The order moved from waiting to a terminal payment state.
    Applied,
    /// The order was already terminal; the callback is a replay.
    AlreadyFinal,
    /// No order exists under this merchant_oid.
    NotFound,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: Order) -> Result<()>;

    /// Insert the line-item snapshots for an order. The orchestrator deletes
    /// the order row if this fails, so no partial order survives.
    async fn insert_order_items(&self, items: Vec<OrderItem>) -> Result<()>;

    /// Compensating delete for a failed item insert. Only the checkout
    /// orchestrator calls this, and only for an order it just created.
    async fn delete_order(&self, order_id: &str) -> Result<()>;

    async fn insert_payment_record(&self, record: PaymentRecord) -> Result<()>;

    /// Mark an order failed after a gateway token rejection. The order row
    /// is kept for audit, never deleted.
    async fn mark_order_failed(&self, order_id: &str, reason: &str) -> Result<()>;

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>>;

    async fn get_order_items(&self, order_id: &str) -> Result<Vec<OrderItem>>;

    async fn get_payment_record(&self, order_id: &str) -> Result<Option<PaymentRecord>>;

    /// Apply a verified callback outcome exactly once.
    ///
    /// Must be a conditional update (apply only while `payment_status` is
    /// still `waiting`), not read-then-write, so two near-simultaneous
    /// duplicate callbacks cannot both win.
    async fn finalize_payment(
        &self,
        order_id: &str,
        outcome: PaymentOutcome,
    ) -> Result<ReconcileResult>;
}

/// Authoritative product pricing, backed by the catalog collaborator.
/// Closes the client-trusted-price gap: submitted prices for known products
/// are checked against this before anything is persisted.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Authoritative unit price in major currency units, or `None` for an
    /// unknown product id.
    async fn unit_price(&self, product_id: &str) -> Result<Option<f64>>;
}
