//! Payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::{Aggregate, Money, Payment, PaymentMethod};
use event_store::EventStore;
use saga::InitiatePayment;
use serde::{Deserialize, Serialize};

use super::{parse_aggregate_id, parse_user_id};
use crate::error::ApiError;
use crate::state::AppState;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

// -- Request types --

#[derive(Deserialize)]
pub struct InitiatePaymentRequest {
    pub booking_id: AggregateId,
    pub amount_cents: i64,
    pub currency: Option<String>,
    pub method: PaymentMethod,
    pub user_id: Option<UserId>,
}

// -- Response types --

#[derive(Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub booking_id: String,
    pub user_id: Option<String>,
    pub amount_cents: i64,
    pub amount: String,
    pub currency: String,
    pub method: Option<String>,
    pub status: String,
    pub provider_order_id: Option<String>,
    pub approval_url: Option<String>,
    pub capture_id: Option<String>,
    pub payer_email: Option<String>,
    pub payer_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        let capture = payment.capture();
        Self {
            id: payment.id().map(|id| id.to_string()).unwrap_or_default(),
            booking_id: payment
                .booking_id()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            user_id: payment.user_id().map(|u| u.to_string()),
            amount_cents: payment.amount().cents(),
            amount: payment.amount().to_decimal_string(),
            currency: payment.currency().to_string(),
            method: payment.method().map(|m| m.to_string()),
            status: payment.status().to_string(),
            provider_order_id: payment.provider_order_id().map(String::from),
            approval_url: payment.approval_url().map(String::from),
            capture_id: capture.capture_id.clone(),
            payer_email: capture.payer_email.clone(),
            payer_id: capture.payer_id.clone(),
            failure_reason: payment.failure_reason().map(String::from),
            created_at: payment.created_at(),
            updated_at: payment.updated_at(),
            completed_at: payment.completed_at(),
            cancelled_at: payment.cancelled_at(),
        }
    }
}

#[derive(Serialize)]
pub struct InitiatePaymentResponse {
    #[serde(flatten)]
    pub payment: PaymentResponse,
    /// Where the customer approves the payment, for provider-based methods.
    pub redirect_url: Option<String>,
}

// -- Handlers --

/// POST /payments: open the booking's payment, or return the existing one.
///
/// `Idempotency-Key` must be a UUID when present. Deduplication is by
/// booking id, not by the key.
#[tracing::instrument(skip(state, headers, req), fields(booking_id = %req.booking_id))]
pub async fn initiate<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<InitiatePaymentResponse>), ApiError> {
    validate_idempotency_key(&headers)?;

    let mut request =
        InitiatePayment::new(req.booking_id, Money::from_cents(req.amount_cents), req.method);
    if let Some(currency) = req.currency {
        request = request.with_currency(currency);
    }
    if let Some(user_id) = req.user_id {
        request = request.with_user(user_id);
    }

    let initiated = state.ledger.initiate(request).await?;
    let status = if initiated.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(InitiatePaymentResponse {
            payment: PaymentResponse::from(&initiated.payment),
            redirect_url: initiated.approval_url,
        }),
    ))
}

fn validate_idempotency_key(headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(());
    };

    value
        .to_str()
        .ok()
        .and_then(|key| uuid::Uuid::parse_str(key).ok())
        .map(|_| ())
        .ok_or_else(|| ApiError::BadRequest("Invalid Idempotency-Key: must be a UUID".to_string()))
}

/// POST /payments/capture/{order_id}
#[tracing::instrument(skip(state))]
pub async fn capture<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state.ledger.capture(&order_id).await?;
    Ok(Json(PaymentResponse::from(&payment)))
}

/// GET /payments/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state.ledger.get(parse_aggregate_id(&id)?).await?;
    Ok(Json(PaymentResponse::from(&payment)))
}

/// GET /payments/booking/{booking_id}
#[tracing::instrument(skip(state))]
pub async fn get_by_booking<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(booking_id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state
        .ledger
        .get_by_booking(parse_aggregate_id(&booking_id)?)
        .await?;
    Ok(Json(PaymentResponse::from(&payment)))
}

/// GET /payments/user/{user_id}
#[tracing::instrument(skip(state))]
pub async fn list_by_user<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    let payments = state.ledger.list_by_user(parse_user_id(&user_id)?).await?;
    Ok(Json(payments.iter().map(PaymentResponse::from).collect()))
}

/// PUT /payments/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state.ledger.cancel(parse_aggregate_id(&id)?).await?;
    Ok(Json(PaymentResponse::from(&payment)))
}
