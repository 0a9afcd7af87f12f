//! Event channel for the flight booking system.
//!
//! Messages are published to a topic exchange under a routing key of the form
//! `<entity>.<verb>`. Durable queues bind to exchanges with routing-key
//! patterns (`*` matches one word, `#` matches zero or more) and keep every
//! delivery until a consumer acknowledges it. Delivery is at-least-once:
//! a message that is not acknowledged is handed out again with
//! `redelivered` set.

pub mod broker;
pub mod error;
pub mod messages;
pub mod publisher;
pub mod topic;

pub use broker::{
    Consumer, DEFAULT_PUBLISH_LOG_CAPACITY, Delivery, InMemoryBroker, PublishedMessage,
};
pub use error::{ChannelError, Result};
pub use messages::{
    BOOKING_EXCHANGE, BOOKING_PAYMENT_EVENTS_QUEUE, BookingEventMessage, BookingEventType,
    PAYMENT_EXCHANGE, PaymentEventMessage, PaymentEventType, declare_topology,
};
pub use publisher::{EventPublisher, EventPublisherExt};
