//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::booking::BookingError;
use crate::payment::PaymentError;
use crate::seating::SeatError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// A booking command was rejected.
    #[error("Booking error: {0}")]
    Booking(BookingError),

    /// A seat map command was rejected.
    #[error("Seat error: {0}")]
    Seat(SeatError),

    /// A payment command was rejected.
    #[error("Payment error: {0}")]
    Payment(PaymentError),

    /// Aggregate not found.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true if another writer advanced the stream first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }
}
