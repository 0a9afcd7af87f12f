//! Read model views.

pub mod bookings;
pub mod payments;

pub use bookings::{BookingSummary, BookingsView};
pub use payments::{PaymentSummary, PaymentsView};
