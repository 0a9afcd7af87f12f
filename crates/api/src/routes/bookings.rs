//! Booking endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{FlightId, UserId};
use domain::{Aggregate, Booking, CreateBooking, Money, Passenger};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::{parse_aggregate_id, parse_user_id};
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_CANCEL_REASON: &str = "Cancelled by customer";

// -- Request types --

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: UserId,
    pub flight_id: FlightId,
    pub total_price_cents: i64,
    pub passengers: Vec<Passenger>,
}

#[derive(Deserialize)]
pub struct ConfirmParams {
    #[serde(rename = "paymentId", alias = "payment_id")]
    pub payment_id: String,
}

#[derive(Deserialize)]
pub struct CancelParams {
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct BookingResponse {
    pub id: String,
    pub reference: String,
    pub user_id: String,
    pub flight_id: String,
    pub status: String,
    pub total_price_cents: i64,
    pub total_price: String,
    pub passengers: Vec<Passenger>,
    pub payment_id: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<&Booking> for BookingResponse {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id().map(|id| id.to_string()).unwrap_or_default(),
            reference: booking
                .reference()
                .map(|r| r.to_string())
                .unwrap_or_default(),
            user_id: booking.user_id().map(|u| u.to_string()).unwrap_or_default(),
            flight_id: booking
                .flight_id()
                .map(|f| f.to_string())
                .unwrap_or_default(),
            status: booking.status().to_string(),
            total_price_cents: booking.total_price().cents(),
            total_price: booking.total_price().to_decimal_string(),
            passengers: booking.passengers().to_vec(),
            payment_id: booking.payment_id().map(|id| id.to_string()),
            cancellation_reason: booking.cancellation_reason().map(String::from),
            created_at: booking.created_at(),
            expires_at: booking.expires_at(),
            updated_at: booking.updated_at(),
            confirmed_at: booking.confirmed_at(),
            cancelled_at: booking.cancelled_at(),
            closed_at: booking.closed_at(),
        }
    }
}

// -- Handlers --

/// POST /bookings: hold one seat per passenger and create a pending booking.
#[tracing::instrument(skip(state, req), fields(flight_id = %req.flight_id, passengers = req.passengers.len()))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let cmd = CreateBooking::new(
        req.user_id,
        req.flight_id,
        Money::from_cents(req.total_price_cents),
        req.passengers,
    );
    let booking = state.coordinator.create_booking(cmd).await?;

    Ok((StatusCode::CREATED, Json(BookingResponse::from(&booking))))
}

/// GET /bookings/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id = parse_aggregate_id(&id)?;
    let booking = state.coordinator.require_booking(booking_id).await?;
    Ok(Json(BookingResponse::from(&booking)))
}

/// GET /bookings/reference/{reference}
#[tracing::instrument(skip(state))]
pub async fn get_by_reference<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(reference): Path<String>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state.coordinator.get_booking_by_reference(&reference).await?;
    Ok(Json(BookingResponse::from(&booking)))
}

/// GET /bookings/user/{user_id}: newest first.
#[tracing::instrument(skip(state))]
pub async fn list_by_user<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let bookings = state.coordinator.list_by_user(user_id).await?;
    Ok(Json(bookings.iter().map(BookingResponse::from).collect()))
}

/// PUT /bookings/{id}/confirm?paymentId=...
#[tracing::instrument(skip(state, params))]
pub async fn confirm<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(params): Query<ConfirmParams>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id = parse_aggregate_id(&id)?;
    let payment_id = parse_aggregate_id(&params.payment_id)?;

    let booking = state
        .coordinator
        .confirm_booking(booking_id, payment_id)
        .await?;
    Ok(Json(BookingResponse::from(&booking)))
}

/// PUT /bookings/{id}/cancel: release the seats of a pending booking.
#[tracing::instrument(skip(state, params))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(params): Query<CancelParams>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking_id = parse_aggregate_id(&id)?;
    let reason = params.reason.as_deref().unwrap_or(DEFAULT_CANCEL_REASON);

    let booking = state.coordinator.cancel_booking(booking_id, reason).await?;
    Ok(Json(BookingResponse::from(&booking)))
}
