//! Seat map domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, FlightId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{AircraftLayout, SeatSpec};

/// Events that can occur on a flight's seat map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SeatMapEvent {
    /// All seats of the flight were created as available.
    SeatsGenerated(SeatsGeneratedData),

    /// A seat was taken by a booking.
    SeatReserved(SeatReservedData),

    /// A seat was handed back by its booking.
    SeatReleased(SeatReleasedData),
}

impl DomainEvent for SeatMapEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SeatMapEvent::SeatsGenerated(_) => "SeatsGenerated",
            SeatMapEvent::SeatReserved(_) => "SeatReserved",
            SeatMapEvent::SeatReleased(_) => "SeatReleased",
        }
    }
}

/// Data for SeatsGenerated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatsGeneratedData {
    pub flight_id: FlightId,
    pub layout: AircraftLayout,
    /// The expanded seat list, stored so replay does not depend on the
    /// numbering rules in force at replay time.
    pub seats: Vec<SeatSpec>,
    pub generated_at: DateTime<Utc>,
}

/// Data for SeatReserved event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatReservedData {
    pub seat_number: String,
    pub booking_id: AggregateId,
    pub reserved_at: DateTime<Utc>,
}

/// Data for SeatReleased event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatReleasedData {
    pub seat_number: String,
    /// The booking that held the seat until now.
    pub booking_id: AggregateId,
    pub released_at: DateTime<Utc>,
}

impl SeatMapEvent {
    pub fn seats_generated(flight_id: FlightId, layout: AircraftLayout) -> Self {
        SeatMapEvent::SeatsGenerated(SeatsGeneratedData {
            flight_id,
            layout,
            seats: layout.generate(),
            generated_at: Utc::now(),
        })
    }

    pub fn seat_reserved(seat_number: impl Into<String>, booking_id: AggregateId) -> Self {
        SeatMapEvent::SeatReserved(SeatReservedData {
            seat_number: seat_number.into(),
            booking_id,
            reserved_at: Utc::now(),
        })
    }

    pub fn seat_released(seat_number: impl Into<String>, booking_id: AggregateId) -> Self {
        SeatMapEvent::SeatReleased(SeatReleasedData {
            seat_number: seat_number.into(),
            booking_id,
            released_at: Utc::now(),
        })
    }
}
