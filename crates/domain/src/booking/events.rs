//! Booking domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, FlightId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

use super::{BookingReference, Passenger};

/// Events that can occur on a booking aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BookingEvent {
    /// Booking was created with its seats held.
    BookingCreated(BookingCreatedData),

    /// Payment completed and the booking was confirmed.
    BookingConfirmed(BookingConfirmedData),

    /// Booking was cancelled.
    BookingCancelled(BookingCancelledData),

    /// Hold window elapsed without payment.
    BookingExpired(BookingExpiredData),
}

impl DomainEvent for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::BookingCreated(_) => "BookingCreated",
            BookingEvent::BookingConfirmed(_) => "BookingConfirmed",
            BookingEvent::BookingCancelled(_) => "BookingCancelled",
            BookingEvent::BookingExpired(_) => "BookingExpired",
        }
    }
}

/// Data for BookingCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCreatedData {
    /// The unique booking ID.
    pub booking_id: AggregateId,

    /// Customer-facing booking code.
    pub reference: BookingReference,

    /// The customer who booked.
    pub user_id: UserId,

    /// The flight booked.
    pub flight_id: FlightId,

    /// Total price of the booking.
    pub total_price: Money,

    /// Travellers, one seat each.
    pub passengers: Vec<Passenger>,

    /// When the booking was created.
    pub created_at: DateTime<Utc>,

    /// When the seat hold lapses if unpaid.
    pub expires_at: DateTime<Utc>,
}

/// Data for BookingConfirmed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmedData {
    /// The payment that settled the booking.
    pub payment_id: AggregateId,

    /// When the booking was confirmed.
    pub confirmed_at: DateTime<Utc>,
}

/// Data for BookingCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCancelledData {
    /// When the booking was cancelled.
    pub cancelled_at: DateTime<Utc>,

    /// Reason for cancellation.
    pub reason: String,
}

/// Data for BookingExpired event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingExpiredData {
    /// When the expiry was recorded.
    pub expired_at: DateTime<Utc>,
}

// Convenience constructors for events
impl BookingEvent {
    /// Creates a BookingConfirmed event.
    pub fn booking_confirmed(payment_id: AggregateId) -> Self {
        BookingEvent::BookingConfirmed(BookingConfirmedData {
            payment_id,
            confirmed_at: Utc::now(),
        })
    }

    /// Creates a BookingCancelled event.
    pub fn booking_cancelled(reason: impl Into<String>) -> Self {
        BookingEvent::BookingCancelled(BookingCancelledData {
            cancelled_at: Utc::now(),
            reason: reason.into(),
        })
    }

    /// Creates a BookingExpired event.
    pub fn booking_expired(expired_at: DateTime<Utc>) -> Self {
        BookingEvent::BookingExpired(BookingExpiredData { expired_at })
    }
}
