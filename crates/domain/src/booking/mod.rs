//! Booking aggregate and related types.

mod aggregate;
mod claim;
mod commands;
mod events;
mod passenger;
mod reference;
mod service;
mod state;

pub use aggregate::Booking;
pub use claim::{ReferenceClaim, ReferenceClaimEvent};
pub use commands::*;
pub use events::{
    BookingCancelledData, BookingConfirmedData, BookingCreatedData, BookingEvent,
    BookingExpiredData,
};
pub use passenger::{DocumentType, Passenger};
pub use reference::BookingReference;
pub use service::BookingService;
pub use state::BookingStatus;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during booking operations.
#[derive(Debug, Error)]
pub enum BookingError {
    /// A booking needs at least one passenger.
    #[error("Booking has no passengers")]
    NoPassengers,

    /// Invalid price.
    #[error("Invalid price: {price} (must be greater than 0)")]
    InvalidPrice { price: i64 },

    /// A required passenger field is blank.
    #[error("Passenger {field} is required")]
    MissingPassengerField { field: &'static str },

    /// Two passengers asked for the same seat.
    #[error("Seat {seat_number} requested more than once")]
    DuplicateSeat { seat_number: String },

    /// A booking reference is malformed.
    #[error("Invalid booking reference: {reference}")]
    InvalidReference { reference: String },

    /// Another booking already owns the reference.
    #[error("Booking reference {reference} is already taken")]
    ReferenceTaken { reference: String },

    /// Booking is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: BookingStatus,
        action: &'static str,
    },

    /// The hold window has not elapsed yet.
    #[error("Booking does not expire until {expires_at}")]
    NotYetExpired { expires_at: DateTime<Utc> },

    /// Booking is already created.
    #[error("Booking already created")]
    AlreadyCreated,
}
