//! Booking-side consumer of payment events.

use std::sync::Arc;

use event_store::EventStore;
use messaging::{Consumer, Delivery, PaymentEventMessage, PaymentEventType};
use tokio::sync::watch;

use crate::coordinator::BookingCoordinator;
use crate::error::{Result, SagaError};

/// What the listener did with one payment event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Confirmed,
    Cancelled,
    /// The booking was already in a terminal state.
    AlreadySettled,
    /// The event type needs no booking change.
    Ignored,
}

/// Applies `payment.*` events to bookings.
///
/// `payment.completed` confirms the booking; `payment.failed` and
/// `payment.cancelled` cancel it. Both go through the same state-guarded
/// transitions as direct calls, so a duplicate delivery lands on
/// [`Handled::AlreadySettled`].
pub struct PaymentEventListener<S: EventStore + Clone> {
    coordinator: Arc<BookingCoordinator<S>>,
}

impl<S: EventStore + Clone> PaymentEventListener<S> {
    pub fn new(coordinator: Arc<BookingCoordinator<S>>) -> Self {
        Self { coordinator }
    }

    /// Applies one decoded event.
    #[tracing::instrument(skip(self, message), fields(event_type = ?message.event_type, booking_id = %message.booking_id))]
    pub async fn handle(&self, message: &PaymentEventMessage) -> Result<Handled> {
        let outcome = match message.event_type {
            PaymentEventType::PaymentCompleted => self
                .coordinator
                .confirm_booking(message.booking_id, message.payment_id)
                .await
                .map(|_| Handled::Confirmed),
            PaymentEventType::PaymentFailed => {
                let reason = format!(
                    "Payment failed: {}",
                    message.failure_reason.as_deref().unwrap_or("unknown reason")
                );
                self.coordinator
                    .cancel_booking(message.booking_id, &reason)
                    .await
                    .map(|_| Handled::Cancelled)
            }
            PaymentEventType::PaymentCancelled => self
                .coordinator
                .cancel_booking(message.booking_id, "Payment cancelled")
                .await
                .map(|_| Handled::Cancelled),
            PaymentEventType::PaymentInitiated | PaymentEventType::PaymentRefunded => {
                tracing::debug!("No booking change for payment event");
                Ok(Handled::Ignored)
            }
            PaymentEventType::Unknown => {
                tracing::warn!("Unrecognized payment event type, dropping");
                metrics::counter!("listener_messages_dropped_total", "reason" => "unknown_type")
                    .increment(1);
                Ok(Handled::Ignored)
            }
        };

        match outcome {
            Err(SagaError::InvalidState(reason)) => {
                tracing::warn!(%reason, "Booking already settled, ignoring payment event");
                Ok(Handled::AlreadySettled)
            }
            other => other,
        }
    }

    /// Decodes, applies and settles one delivery.
    ///
    /// Every delivery is acknowledged except a transient failure on its
    /// first delivery, which is requeued once.
    pub async fn process(&self, consumer: &Consumer, delivery: Delivery) {
        let tag = delivery.delivery_tag;

        let result = match delivery.decode::<PaymentEventMessage>() {
            Ok(message) => self.handle(&message).await,
            Err(e) => {
                tracing::warn!(
                    routing_key = %delivery.routing_key,
                    error = %e,
                    "Undecodable payment event, dropping"
                );
                metrics::counter!("listener_messages_dropped_total", "reason" => "malformed")
                    .increment(1);
                Ok(Handled::Ignored)
            }
        };

        let settled = match result {
            Ok(handled) => {
                metrics::counter!("listener_messages_processed_total").increment(1);
                tracing::debug!(?handled, "Payment event handled");
                consumer.ack(tag)
            }
            Err(e) if e.is_transient() && !delivery.redelivered => {
                tracing::warn!(error = %e, "Transient failure handling payment event, requeueing");
                consumer.nack(tag, true)
            }
            Err(e) => {
                tracing::error!(
                    routing_key = %delivery.routing_key,
                    redelivered = delivery.redelivered,
                    error = %e,
                    "Failed to handle payment event, dropping"
                );
                metrics::counter!("listener_messages_dropped_total", "reason" => "error")
                    .increment(1);
                consumer.ack(tag)
            }
        };

        if let Err(e) = settled {
            tracing::error!(delivery_tag = tag, error = %e, "Failed to settle delivery");
        }
    }

    /// Consumes until the queue closes or `shutdown` flips to true.
    pub async fn run(&self, consumer: Consumer, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(queue = consumer.queue_name(), "Payment event listener started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                delivery = consumer.recv() => match delivery {
                    Some(delivery) => self.process(&consumer, delivery).await,
                    None => break,
                },
            }
        }

        tracing::info!("Payment event listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{LocalSeatInventory, SeatInventory};
    use std::sync::atomic::{AtomicBool, Ordering};
    use crate::read::ReadModels;
    use chrono::Utc;
    use common::{AggregateId, FlightId, UserId};
    use domain::{
        Aggregate, AircraftLayout, BookingStatus, CreateBooking, DocumentType, Money, Passenger,
    };
    use async_trait::async_trait;
    use event_store::{
        AppendOptions, EventEnvelope, EventStoreError, EventStream, InMemoryEventStore, Version,
    };
    use messaging::{
        BOOKING_PAYMENT_EVENTS_QUEUE, EventPublisherExt, InMemoryBroker, PAYMENT_EXCHANGE,
        declare_topology,
    };

    struct Fixture<S: EventStore + Clone = InMemoryEventStore> {
        listener: PaymentEventListener<S>,
        coordinator: Arc<BookingCoordinator<S>>,
        broker: InMemoryBroker,
        booking_id: AggregateId,
    }

    /// Store whose appends lose to a concurrent writer while `contended`.
    #[derive(Clone, Default)]
    struct ContendedStore {
        inner: InMemoryEventStore,
        contended: Arc<AtomicBool>,
    }

    #[async_trait]
    impl EventStore for ContendedStore {
        async fn append(
            &self,
            events: Vec<EventEnvelope>,
            options: AppendOptions,
        ) -> event_store::Result<Version> {
            if self.contended.load(Ordering::SeqCst) {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: events[0].aggregate_id,
                    expected: options.expected_version.unwrap_or(Version::initial()),
                    actual: events[0].version,
                });
            }
            self.inner.append(events, options).await
        }

        async fn get_events_for_aggregate(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Vec<EventEnvelope>> {
            self.inner.get_events_for_aggregate(aggregate_id).await
        }

        async fn stream_events_after(&self, after: u64) -> event_store::Result<EventStream> {
            self.inner.stream_events_after(after).await
        }

        async fn get_aggregate_version(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Option<Version>> {
            self.inner.get_aggregate_version(aggregate_id).await
        }
    }

    async fn setup() -> Fixture {
        setup_on(InMemoryEventStore::new()).await
    }

    async fn setup_on<S: EventStore + Clone + 'static>(store: S) -> Fixture<S> {
        let broker = InMemoryBroker::new();
        declare_topology(&broker).unwrap();
        let inventory = Arc::new(LocalSeatInventory::new(store.clone()));
        let flight_id = FlightId::new();
        inventory
            .generate(flight_id, AircraftLayout::new(0, 0, 12))
            .await
            .unwrap();

        let coordinator = Arc::new(BookingCoordinator::new(
            store.clone(),
            inventory,
            Arc::new(ReadModels::new(store)),
            Arc::new(broker.clone()),
        ));
        let booking = coordinator
            .create_booking(CreateBooking::new(
                UserId::new(),
                flight_id,
                Money::from_units(150),
                vec![Passenger::new(
                    "Ada",
                    "Lovelace",
                    DocumentType::Passport,
                    "X1",
                    "1A",
                )],
            ))
            .await
            .unwrap();

        Fixture {
            listener: PaymentEventListener::new(coordinator.clone()),
            coordinator,
            broker,
            booking_id: booking.id().unwrap(),
        }
    }

    fn message(booking_id: AggregateId, event_type: PaymentEventType) -> PaymentEventMessage {
        PaymentEventMessage {
            event_type,
            payment_id: AggregateId::new(),
            booking_id,
            amount: "150.00".to_string(),
            currency: "USD".to_string(),
            status: "COMPLETED".to_string(),
            provider_order_id: None,
            failure_reason: Some("card declined".to_string()),
            timestamp: Utc::now(),
        }
    }

    async fn status(f: &Fixture) -> BookingStatus {
        f.coordinator
            .require_booking(f.booking_id)
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_completed_confirms_once() {
        let f = setup().await;
        let event = message(f.booking_id, PaymentEventType::PaymentCompleted);

        assert_eq!(f.listener.handle(&event).await.unwrap(), Handled::Confirmed);
        assert_eq!(
            f.listener.handle(&event).await.unwrap(),
            Handled::AlreadySettled
        );
        assert_eq!(status(&f).await, BookingStatus::Confirmed);
        assert_eq!(f.broker.published_with_key("booking.confirmed").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_cancels_with_reason() {
        let f = setup().await;
        let event = message(f.booking_id, PaymentEventType::PaymentFailed);

        assert_eq!(f.listener.handle(&event).await.unwrap(), Handled::Cancelled);

        let booking = f.coordinator.require_booking(f.booking_id).await.unwrap();
        assert_eq!(booking.status(), BookingStatus::Cancelled);
        assert_eq!(
            booking.cancellation_reason(),
            Some("Payment failed: card declined")
        );
    }

    #[tokio::test]
    async fn test_unknown_booking_is_an_error() {
        let f = setup().await;
        let event = message(AggregateId::new(), PaymentEventType::PaymentCancelled);

        assert!(matches!(
            f.listener.handle(&event).await,
            Err(SagaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_process_acks_everything_it_cannot_use() {
        let f = setup().await;
        let consumer = f.broker.consume(BOOKING_PAYMENT_EVENTS_QUEUE).unwrap();

        f.broker
            .publish(
                PAYMENT_EXCHANGE,
                "payment.refunded",
                &serde_json::json!({ "eventType": "PAYMENT_CHARGEBACK" }),
            )
            .await
            .unwrap();
        f.broker
            .publish(
                PAYMENT_EXCHANGE,
                "payment.cancelled",
                &message(AggregateId::new(), PaymentEventType::PaymentCancelled),
            )
            .await
            .unwrap();

        while let Some(delivery) = consumer.try_recv() {
            f.listener.process(&consumer, delivery).await;
        }

        assert_eq!(consumer.unacked_count(), 0);
        assert_eq!(f.broker.queue_depth(BOOKING_PAYMENT_EVENTS_QUEUE), 0);
        assert_eq!(status(&f).await, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_transient_failure_is_requeued_once_then_dropped() {
        let store = ContendedStore::default();
        let f = setup_on(store.clone()).await;
        let consumer = f.broker.consume(BOOKING_PAYMENT_EVENTS_QUEUE).unwrap();
        store.contended.store(true, Ordering::SeqCst);

        f.broker
            .publish(
                PAYMENT_EXCHANGE,
                "payment.completed",
                &message(f.booking_id, PaymentEventType::PaymentCompleted),
            )
            .await
            .unwrap();

        let first = consumer.try_recv().unwrap();
        assert!(!first.redelivered);
        f.listener.process(&consumer, first).await;

        assert_eq!(f.broker.queue_depth(BOOKING_PAYMENT_EVENTS_QUEUE), 1);
        assert_eq!(consumer.unacked_count(), 0);

        let second = consumer.try_recv().unwrap();
        assert!(second.redelivered);
        f.listener.process(&consumer, second).await;

        assert_eq!(f.broker.queue_depth(BOOKING_PAYMENT_EVENTS_QUEUE), 0);
        assert_eq!(consumer.unacked_count(), 0);
        assert!(consumer.try_recv().is_none());

        store.contended.store(false, Ordering::SeqCst);
        let booking = f.coordinator.require_booking(f.booking_id).await.unwrap();
        assert_eq!(booking.status(), BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let f = setup().await;
        let consumer = f.broker.consume(BOOKING_PAYMENT_EVENTS_QUEUE).unwrap();
        let (tx, rx) = watch::channel(false);

        f.broker
            .publish(
                PAYMENT_EXCHANGE,
                "payment.completed",
                &message(f.booking_id, PaymentEventType::PaymentCompleted),
            )
            .await
            .unwrap();

        let listener = Arc::new(f.listener);
        let running = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.run(consumer, rx).await })
        };

        for _ in 0..50 {
            if f.broker.published_with_key("booking.confirmed").len() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        tx.send(true).unwrap();
        running.await.unwrap();

        let booking = f.coordinator.require_booking(f.booking_id).await.unwrap();
        assert_eq!(booking.status(), BookingStatus::Confirmed);
    }
}
