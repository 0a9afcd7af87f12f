//! Query side of the flight booking system.
//!
//! Aggregates answer lookups by id. Everything else (bookings by reference
//! or user, the reaper's overdue scan, payments by provider order or user)
//! is served from read models that [`ProjectionProcessor`] keeps in step
//! with the event store.

pub mod error;
pub mod processor;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::{DEFAULT_GAP_HORIZON, ProjectionProcessor};
pub use projection::{Projection, ProjectionPosition, ReadModel};
pub use views::{BookingSummary, BookingsView, PaymentSummary, PaymentsView};
