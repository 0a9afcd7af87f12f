//! Shared identifier types for the flight booking system.

pub mod types;

pub use types::{AggregateId, FlightId, UserId};
