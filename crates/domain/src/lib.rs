//! Domain layer for the flight booking system.
//!
//! This crate provides the event-sourced aggregates behind the booking saga:
//! - [`SeatMap`]: every seat of one flight and who holds it
//! - [`Booking`]: a customer's booking, its passengers and lifecycle
//! - [`Payment`]: the single payment record of a booking
//!
//! Aggregates decide (command methods return events) and evolve (`apply`);
//! [`CommandHandler`] loads them from the event store and appends new events
//! with an expected version.

pub mod aggregate;
pub mod booking;
pub mod command;
pub mod error;
pub mod money;
pub mod payment;
pub mod seating;

pub use aggregate::{Aggregate, DomainEvent};
pub use booking::{
    Booking, BookingError, BookingEvent, BookingReference, BookingService, BookingStatus,
    CancelBooking, ConfirmBooking, CreateBooking, DocumentType, Passenger, ReferenceClaim,
};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use money::Money;
pub use payment::{
    CaptureDetails, DEFAULT_CURRENCY, OpenPayment, Opened, Payment, PaymentError, PaymentEvent,
    PaymentMethod, PaymentService, PaymentStatus,
};
pub use seating::{
    AircraftLayout, MAX_SEATS, Seat, SeatClass, SeatError, SeatMap, SeatMapEvent, SeatMapService,
    SeatSpec, SeatStatus,
};
