//! Flight seat inventory endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::FlightId;
use domain::{AircraftLayout, Seat, SeatMap};
use event_store::EventStore;
use saga::SagaError;
use serde::{Deserialize, Serialize};

use super::{parse_aggregate_id, parse_flight_id};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct HolderParams {
    pub booking_id: String,
}

#[derive(Serialize)]
pub struct OccupancyResponse {
    pub flight_id: String,
    pub total_seats: u32,
    pub available_seats: u32,
    pub booked_seats: u32,
    pub occupancy_rate: f64,
}

impl OccupancyResponse {
    fn new(flight_id: FlightId, map: &SeatMap) -> Self {
        Self {
            flight_id: flight_id.to_string(),
            total_seats: map.total_seats(),
            available_seats: map.available_seats(),
            booked_seats: map.booked_seats(),
            occupancy_rate: map.occupancy_rate(),
        }
    }
}

#[derive(Serialize)]
pub struct SeatsGeneratedResponse {
    #[serde(flatten)]
    pub occupancy: OccupancyResponse,
    pub seats: Vec<Seat>,
}

#[derive(Serialize)]
pub struct ReserveResponse {
    pub seat_number: String,
    pub reserved: bool,
}

async fn load_seat_map<S: EventStore + Clone>(
    state: &AppState<S>,
    flight_id: FlightId,
) -> Result<SeatMap, ApiError> {
    state
        .inventory
        .seat_map(flight_id)
        .await?
        .ok_or_else(|| {
            SagaError::NotFound(format!("No seats generated for flight: {flight_id}")).into()
        })
}

/// POST /flights/{flight_id}/seats: lay out seats from an aircraft layout.
#[tracing::instrument(skip(state))]
pub async fn generate<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(flight_id): Path<String>,
    Json(layout): Json<AircraftLayout>,
) -> Result<(StatusCode, Json<SeatsGeneratedResponse>), ApiError> {
    let flight_id = parse_flight_id(&flight_id)?;
    let map = state.inventory.generate(flight_id, layout).await?;

    Ok((
        StatusCode::CREATED,
        Json(SeatsGeneratedResponse {
            occupancy: OccupancyResponse::new(flight_id, &map),
            seats: map.seats().cloned().collect(),
        }),
    ))
}

/// GET /flights/{flight_id}/seats
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(flight_id): Path<String>,
) -> Result<Json<Vec<Seat>>, ApiError> {
    let map = load_seat_map(&state, parse_flight_id(&flight_id)?).await?;
    Ok(Json(map.seats().cloned().collect()))
}

/// GET /flights/{flight_id}/seats/available
#[tracing::instrument(skip(state))]
pub async fn list_available<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(flight_id): Path<String>,
) -> Result<Json<Vec<Seat>>, ApiError> {
    let map = load_seat_map(&state, parse_flight_id(&flight_id)?).await?;
    Ok(Json(map.available().cloned().collect()))
}

/// GET /flights/{flight_id}/occupancy
#[tracing::instrument(skip(state))]
pub async fn occupancy<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(flight_id): Path<String>,
) -> Result<Json<OccupancyResponse>, ApiError> {
    let flight_id = parse_flight_id(&flight_id)?;
    let map = load_seat_map(&state, flight_id).await?;
    Ok(Json(OccupancyResponse::new(flight_id, &map)))
}

/// PUT /flights/{flight_id}/seats/{seat_number}/reserve?booking_id=...
///
/// A seat held by another booking answers `reserved: false`.
#[tracing::instrument(skip(state, params))]
pub async fn reserve<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((flight_id, seat_number)): Path<(String, String)>,
    Query(params): Query<HolderParams>,
) -> Result<Json<ReserveResponse>, ApiError> {
    let flight_id = parse_flight_id(&flight_id)?;
    let booking_id = parse_aggregate_id(&params.booking_id)?;

    let reserved = state
        .inventory
        .reserve(flight_id, &seat_number, booking_id)
        .await?;
    Ok(Json(ReserveResponse {
        seat_number,
        reserved,
    }))
}

/// PUT /flights/{flight_id}/seats/{seat_number}/release?booking_id=...
#[tracing::instrument(skip(state, params))]
pub async fn release<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((flight_id, seat_number)): Path<(String, String)>,
    Query(params): Query<HolderParams>,
) -> Result<StatusCode, ApiError> {
    let flight_id = parse_flight_id(&flight_id)?;
    let booking_id = parse_aggregate_id(&params.booking_id)?;

    state
        .inventory
        .release(flight_id, &seat_number, booking_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
