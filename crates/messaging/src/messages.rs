//! Wire messages exchanged between the booking and payment sides.

use chrono::{DateTime, Utc};
use common::{AggregateId, FlightId, UserId};
use serde::{Deserialize, Serialize};

use crate::broker::InMemoryBroker;
use crate::error::Result;

pub const BOOKING_EXCHANGE: &str = "booking.exchange";
pub const PAYMENT_EXCHANGE: &str = "payment.exchange";

/// Durable queue the booking side reads payment outcomes from.
pub const BOOKING_PAYMENT_EVENTS_QUEUE: &str = "booking.payment-events";

/// Declares the exchanges and the booking listener queue.
pub fn declare_topology(broker: &InMemoryBroker) -> Result<()> {
    broker.declare_exchange(BOOKING_EXCHANGE);
    broker.declare_exchange(PAYMENT_EXCHANGE);
    broker.declare_queue(BOOKING_PAYMENT_EVENTS_QUEUE);
    broker.bind(BOOKING_PAYMENT_EVENTS_QUEUE, PAYMENT_EXCHANGE, "payment.*")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEventType {
    BookingCreated,
    BookingConfirmed,
    BookingCancelled,
    BookingExpired,
}

impl BookingEventType {
    pub fn routing_key(&self) -> &'static str {
        match self {
            BookingEventType::BookingCreated => "booking.created",
            BookingEventType::BookingConfirmed => "booking.confirmed",
            BookingEventType::BookingCancelled => "booking.cancelled",
            BookingEventType::BookingExpired => "booking.expired",
        }
    }
}

/// Payment outcome kinds. Kinds this build does not know decode as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentEventType {
    PaymentInitiated,
    PaymentCompleted,
    PaymentFailed,
    PaymentCancelled,
    PaymentRefunded,
    #[serde(other)]
    Unknown,
}

impl PaymentEventType {
    pub fn routing_key(&self) -> &'static str {
        match self {
            PaymentEventType::PaymentInitiated => "payment.initiated",
            PaymentEventType::PaymentCompleted => "payment.completed",
            PaymentEventType::PaymentFailed => "payment.failed",
            PaymentEventType::PaymentCancelled => "payment.cancelled",
            PaymentEventType::PaymentRefunded => "payment.refunded",
            PaymentEventType::Unknown => "payment.unknown",
        }
    }
}

/// Message published on every booking lifecycle change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEventMessage {
    pub event_type: BookingEventType,
    pub booking_id: AggregateId,
    pub booking_reference: String,
    pub flight_id: FlightId,
    pub user_id: UserId,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl BookingEventMessage {
    pub fn routing_key(&self) -> &'static str {
        self.event_type.routing_key()
    }
}

/// Message published on every payment lifecycle change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEventMessage {
    pub event_type: PaymentEventType,
    pub payment_id: AggregateId,
    pub booking_id: AggregateId,
    /// Decimal amount, e.g. `"100.00"`.
    pub amount: String,
    pub currency: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PaymentEventMessage {
    pub fn routing_key(&self) -> &'static str {
        self.event_type.routing_key()
    }
}
