//! Append-only event store with optimistic concurrency control.
//!
//! Every aggregate stream (seat maps, bookings, payments) is stored as an
//! ordered list of [`EventEnvelope`]s. Appends carry an expected version so
//! concurrent writers to the same stream cannot both succeed.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
