//! Booking commands.

use common::{AggregateId, FlightId, UserId};

use crate::command::Command;
use crate::money::Money;

use super::{Booking, Passenger};

/// Command to create a new booking.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    /// The booking ID to create.
    pub booking_id: AggregateId,

    /// The customer booking.
    pub user_id: UserId,

    /// The flight to book.
    pub flight_id: FlightId,

    /// Total price quoted for the booking.
    pub total_price: Money,

    /// Travellers and their chosen seats.
    pub passengers: Vec<Passenger>,
}

impl CreateBooking {
    /// Creates a new CreateBooking command with a generated booking ID.
    pub fn new(
        user_id: UserId,
        flight_id: FlightId,
        total_price: Money,
        passengers: Vec<Passenger>,
    ) -> Self {
        Self {
            booking_id: AggregateId::new(),
            user_id,
            flight_id,
            total_price,
            passengers,
        }
    }

    /// Returns the requested seat numbers in passenger order.
    pub fn seat_numbers(&self) -> impl Iterator<Item = &str> {
        self.passengers.iter().map(|p| p.seat_number.as_str())
    }
}

impl Command for CreateBooking {
    type Aggregate = Booking;

    fn aggregate_id(&self) -> AggregateId {
        self.booking_id
    }
}

/// Command to confirm a booking after payment.
#[derive(Debug, Clone)]
pub struct ConfirmBooking {
    /// The booking to confirm.
    pub booking_id: AggregateId,

    /// The completed payment.
    pub payment_id: AggregateId,
}

impl ConfirmBooking {
    /// Creates a new ConfirmBooking command.
    pub fn new(booking_id: AggregateId, payment_id: AggregateId) -> Self {
        Self {
            booking_id,
            payment_id,
        }
    }
}

impl Command for ConfirmBooking {
    type Aggregate = Booking;

    fn aggregate_id(&self) -> AggregateId {
        self.booking_id
    }
}

/// Command to cancel a booking.
#[derive(Debug, Clone)]
pub struct CancelBooking {
    /// The booking to cancel.
    pub booking_id: AggregateId,

    /// Reason for cancellation.
    pub reason: String,
}

impl CancelBooking {
    /// Creates a new CancelBooking command.
    pub fn new(booking_id: AggregateId, reason: impl Into<String>) -> Self {
        Self {
            booking_id,
            reason: reason.into(),
        }
    }
}

impl Command for CancelBooking {
    type Aggregate = Booking;

    fn aggregate_id(&self) -> AggregateId {
        self.booking_id
    }
}
