//! Seat map aggregate: every seat of one flight and which booking holds it.

mod aggregate;
mod events;
mod layout;
mod seat;
mod service;

pub use aggregate::SeatMap;
pub use events::{SeatMapEvent, SeatReleasedData, SeatReservedData, SeatsGeneratedData};
pub use layout::{AircraftLayout, MAX_SEATS, SeatSpec};
pub use seat::{Seat, SeatClass, SeatStatus};
pub use service::SeatMapService;

use common::AggregateId;
use thiserror::Error;

/// Errors that can occur during seat map operations.
#[derive(Debug, Error)]
pub enum SeatError {
    /// No seats have been generated for the flight.
    #[error("No seats generated for this flight")]
    NotGenerated,

    /// A layout with zero seats cannot be generated.
    #[error("Aircraft layout must contain at least one seat")]
    EmptyLayout,

    /// A layout with more seats than any aircraft carries.
    #[error("Aircraft layout exceeds {max} seats")]
    LayoutTooLarge { max: u32 },

    /// The seat number does not exist on this flight.
    #[error("Seat not found: {seat_number}")]
    SeatNotFound { seat_number: String },

    /// The seat is held by a different booking than the one releasing it.
    #[error("Seat {seat_number} is held by booking {holder}")]
    HeldByAnotherBooking {
        seat_number: String,
        holder: AggregateId,
    },
}
