//! Saga error types.

use domain::{BookingError, DomainError, PaymentError, SeatError};
use event_store::EventStoreError;
use messaging::ChannelError;
use projections::ProjectionError;
use thiserror::Error;

/// Errors surfaced by the booking and payment sagas.
///
/// The first five variants are the caller-facing taxonomy; the rest wrap
/// infrastructure failures.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A booking, payment, flight or seat does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The requested transition is not allowed from the current state.
    #[error("{0}")]
    InvalidState(String),

    /// Another booking holds a requested seat.
    #[error("Seat {seat_number} is not available for passenger {passenger}")]
    SeatUnavailable {
        seat_number: String,
        passenger: String,
    },

    /// The payment provider rejected or failed a call.
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// Malformed input.
    #[error("{0}")]
    Validation(String),

    /// A collaborator could not be reached; the call may succeed if retried.
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: &'static str,
        reason: String,
    },

    #[error("Domain error: {0}")]
    Domain(DomainError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Event channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),
}

impl SagaError {
    /// Whether retrying the same call can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SagaError::Unavailable { .. } => true,
            SagaError::EventStore(e) => e.is_conflict(),
            SagaError::Domain(e) => e.is_conflict(),
            _ => false,
        }
    }

    /// Whether another writer advanced the stream first.
    pub fn is_conflict(&self) -> bool {
        match self {
            SagaError::EventStore(e) => e.is_conflict(),
            SagaError::Domain(e) => e.is_conflict(),
            _ => false,
        }
    }
}

impl From<DomainError> for SagaError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::AggregateNotFound {
                aggregate_type,
                aggregate_id,
            } => SagaError::NotFound(format!("{aggregate_type} not found: {aggregate_id}")),
            DomainError::Booking(e) => classify_booking(e),
            DomainError::Seat(e) => classify_seat(e),
            DomainError::Payment(e) => classify_payment(e),
            DomainError::EventStore(e) => SagaError::EventStore(e),
            other => SagaError::Domain(other),
        }
    }
}

fn classify_booking(e: BookingError) -> SagaError {
    match e {
        BookingError::InvalidStateTransition { .. }
        | BookingError::NotYetExpired { .. }
        | BookingError::AlreadyCreated => SagaError::InvalidState(e.to_string()),
        BookingError::NoPassengers
        | BookingError::InvalidPrice { .. }
        | BookingError::MissingPassengerField { .. }
        | BookingError::DuplicateSeat { .. }
        | BookingError::InvalidReference { .. } => SagaError::Validation(e.to_string()),
        BookingError::ReferenceTaken { .. } => SagaError::Domain(DomainError::Booking(e)),
    }
}

fn classify_seat(e: SeatError) -> SagaError {
    match e {
        SeatError::NotGenerated | SeatError::SeatNotFound { .. } => {
            SagaError::NotFound(e.to_string())
        }
        SeatError::HeldByAnotherBooking { .. } => SagaError::InvalidState(e.to_string()),
        SeatError::EmptyLayout | SeatError::LayoutTooLarge { .. } => {
            SagaError::Validation(e.to_string())
        }
    }
}

fn classify_payment(e: PaymentError) -> SagaError {
    match e {
        PaymentError::InvalidStateTransition { .. } | PaymentError::AlreadyOpened => {
            SagaError::InvalidState(e.to_string())
        }
        PaymentError::InvalidAmount { .. } | PaymentError::InvalidCurrency { .. } => {
            SagaError::Validation(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, SagaError>;
