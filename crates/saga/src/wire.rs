//! Aggregate-to-message mapping and best-effort publishing.

use chrono::Utc;
use domain::{Aggregate, Booking, Payment};
use messaging::{
    BOOKING_EXCHANGE, BookingEventMessage, BookingEventType, EventPublisher, EventPublisherExt,
    PAYMENT_EXCHANGE, PaymentEventMessage, PaymentEventType,
};

pub fn booking_message(booking: &Booking, event_type: BookingEventType) -> Option<BookingEventMessage> {
    Some(BookingEventMessage {
        event_type,
        booking_id: booking.id()?,
        booking_reference: booking.reference()?.as_str().to_string(),
        flight_id: booking.flight_id()?,
        user_id: booking.user_id()?,
        status: booking.status().as_str().to_string(),
        timestamp: booking.updated_at().unwrap_or_else(Utc::now),
    })
}

pub fn payment_message(payment: &Payment, event_type: PaymentEventType) -> Option<PaymentEventMessage> {
    Some(PaymentEventMessage {
        event_type,
        payment_id: payment.id()?,
        booking_id: payment.booking_id()?,
        amount: payment.amount().to_decimal_string(),
        currency: payment.currency().to_string(),
        status: payment.status().as_str().to_string(),
        provider_order_id: payment.provider_order_id().map(str::to_string),
        failure_reason: payment.failure_reason().map(str::to_string),
        timestamp: payment.updated_at().unwrap_or_else(Utc::now),
    })
}

/// Publishes a booking event after its state change has been committed.
///
/// A failed publish is logged and does not undo the state change.
pub async fn publish_booking(
    publisher: &dyn EventPublisher,
    booking: &Booking,
    event_type: BookingEventType,
) {
    let Some(message) = booking_message(booking, event_type) else {
        tracing::error!(?event_type, "Booking is missing fields, event not published");
        return;
    };

    if let Err(e) = publisher
        .publish(BOOKING_EXCHANGE, message.routing_key(), &message)
        .await
    {
        tracing::error!(
            booking_id = %message.booking_id,
            routing_key = message.routing_key(),
            error = %e,
            "Failed to publish booking event"
        );
    }
}

/// Publishes a payment event after its state change has been committed.
pub async fn publish_payment(
    publisher: &dyn EventPublisher,
    payment: &Payment,
    event_type: PaymentEventType,
) {
    let Some(message) = payment_message(payment, event_type) else {
        tracing::error!(?event_type, "Payment is missing fields, event not published");
        return;
    };

    if let Err(e) = publisher
        .publish(PAYMENT_EXCHANGE, message.routing_key(), &message)
        .await
    {
        tracing::error!(
            payment_id = %message.payment_id,
            routing_key = message.routing_key(),
            error = %e,
            "Failed to publish payment event"
        );
    }
}
