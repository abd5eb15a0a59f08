//! Payment endpoints: session creation, the gateway callback, order status,
//! and the browser redirect targets.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use crate::{
    dtos::{CreatePaymentRequest, CreatePaymentResponse, PaytrCallback},
    models::{Order, OrderItem, PaymentRecord},
    services::{metrics, PaymentOutcome, ReconcileResult},
    AppState,
};

/// Fixed acknowledgement body the gateway expects; anything else triggers
/// its retry loop.
const CALLBACK_ACK: &str = "OK";

/// Best-effort client IP: proxy headers first, else the placeholder the
/// gateway accepts for server-originated requests.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        })
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

/// Create a payment session: persists the order and returns the hosted
/// payment page URL for the storefront to redirect to.
pub async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), AppError> {
    let ip = client_ip(&headers);
    let data = state.checkout.create_payment(payload, ip).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            success: true,
            data,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Option<PaymentRecord>,
}

/// Order query facade: order + line items + payment session by order id.
///
/// Guest orders are retrievable by id alone; the id's random suffix is what
/// makes that tolerable. When the caller supplies a `userId`, orders owned
/// by a different user are reported as not found rather than denied, so the
/// endpoint leaks nothing about foreign order ids.
pub async fn payment_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<OrderStatusResponse>, AppError> {
    let order = state
        .store
        .get_order(&query.order_id)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("order not found")))?;

    if let (Some(owner), Some(caller)) = (&order.user_id, &query.user_id) {
        if owner != caller {
            return Err(AppError::NotFound(anyhow::anyhow!("order not found")));
        }
    }

    let items = state
        .store
        .get_order_items(&query.order_id)
        .await
        .map_err(AppError::DatabaseError)?;
    let payment = state
        .store
        .get_payment_record(&query.order_id)
        .await
        .map_err(AppError::DatabaseError)?;

    Ok(Json(OrderStatusResponse {
        order,
        items,
        payment,
    }))
}

/// Gateway server-to-server callback.
///
/// Signature verification gates everything: an unverifiable callback gets a
/// 401 with no acknowledgement body, so the gateway keeps retrying and a
/// transient verification bug cannot drop a real payment notification. Every
/// verified callback is acknowledged with the fixed body, including replays
/// and unknown order ids, to stop the retry loop.
pub async fn paytr_callback(
    State(state): State<AppState>,
    Form(payload): Form<PaytrCallback>,
) -> Result<impl IntoResponse, AppError> {
    let matched = state
        .paytr
        .verify_callback_hash(
            &payload.merchant_oid,
            &payload.status,
            &payload.total_amount,
            &payload.hash,
        )
        .map_err(AppError::InternalError)?;

    if matched.is_none() {
        metrics::record_callback("rejected_hash");
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "callback hash verification failed"
        )));
    }

    let outcome = if payload.status == "success" {
        PaymentOutcome::Success
    } else {
        PaymentOutcome::Failed {
            reason: payload.failed_reason_msg.clone(),
        }
    };

    let result = state
        .store
        .finalize_payment(&payload.merchant_oid, outcome)
        .await
        .map_err(AppError::DatabaseError)?;

    match result {
        ReconcileResult::Applied => {
            metrics::record_callback("applied");
            tracing::info!(
                merchant_oid = %payload.merchant_oid,
                callback_status = %payload.status,
                "payment outcome applied"
            );
        }
        ReconcileResult::AlreadyFinal => {
            metrics::record_callback("replayed");
            tracing::info!(
                merchant_oid = %payload.merchant_oid,
                "duplicate callback for terminal order; acknowledging without re-apply"
            );
        }
        ReconcileResult::NotFound => {
            metrics::record_callback("unknown_order");
            tracing::warn!(
                merchant_oid = %payload.merchant_oid,
                "callback for unknown order; acknowledged for investigation"
            );
        }
    }

    Ok((StatusCode::OK, CALLBACK_ACK))
}

/// Query params the gateway appends to the browser redirect. Display-only:
/// the server-to-server callback is the sole authority on payment outcome.
#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    pub merchant_oid: Option<String>,
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
    pub status: Option<String>,
    /// Minor units, as the gateway sends it.
    pub total_amount: Option<String>,
    pub failed_reason_msg: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RedirectView {
    pub order_id: Option<String>,
    pub status: Option<String>,
    pub total_amount: Option<String>,
    pub reason: Option<String>,
    /// Reminder for API consumers: poll /payment/status for the real outcome.
    pub authoritative: bool,
}

impl RedirectView {
    fn from_query(query: RedirectQuery) -> Self {
        Self {
            order_id: query.merchant_oid.or(query.order_id),
            status: query.status,
            total_amount: query.total_amount,
            reason: query.failed_reason_msg,
            authoritative: false,
        }
    }
}

/// Browser lands here after a successful hosted payment.
pub async fn payment_success(Query(query): Query<RedirectQuery>) -> Json<RedirectView> {
    Json(RedirectView::from_query(query))
}

/// Browser lands here after a failed or abandoned hosted payment.
pub async fn payment_failure(Query(query): Query<RedirectQuery>) -> Json<RedirectView> {
    Json(RedirectView::from_query(query))
}
