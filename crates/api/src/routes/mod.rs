//! HTTP route handlers.

pub mod bookings;
pub mod flights;
pub mod health;
pub mod metrics;
pub mod payments;

use common::{AggregateId, FlightId, UserId};
use uuid::Uuid;

use crate::error::ApiError;

fn parse_uuid(value: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value).map_err(|e| ApiError::BadRequest(format!("Invalid {what}: {e}")))
}

pub(crate) fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    parse_uuid(id, "ID format").map(AggregateId::from)
}

pub(crate) fn parse_flight_id(id: &str) -> Result<FlightId, ApiError> {
    parse_uuid(id, "flight ID").map(FlightId::from)
}

pub(crate) fn parse_user_id(id: &str) -> Result<UserId, ApiError> {
    parse_uuid(id, "user ID").map(UserId::from)
}
