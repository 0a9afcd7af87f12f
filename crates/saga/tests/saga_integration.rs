//! End-to-end tests for the booking–payment saga.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{AggregateId, FlightId, UserId};
use domain::{
    Aggregate, AircraftLayout, BookingStatus, CreateBooking, DocumentType, Money, Passenger,
    PaymentMethod, PaymentStatus, SeatMap,
};
use event_store::InMemoryEventStore;
use messaging::{BOOKING_PAYMENT_EVENTS_QUEUE, Consumer, InMemoryBroker, declare_topology};
use saga::{
    BookingCoordinator, ExpirationReaper, InitiatePayment, LocalSeatInventory, PaymentEventListener,
    PaymentLedger, ReadModels, RetryPolicy, SagaError, SandboxPaymentProvider, SeatInventory,
};

struct TestHarness {
    coordinator: Arc<BookingCoordinator<InMemoryEventStore>>,
    ledger: Arc<PaymentLedger<InMemoryEventStore>>,
    listener: PaymentEventListener<InMemoryEventStore>,
    consumer: Consumer,
    provider: SandboxPaymentProvider,
    broker: InMemoryBroker,
    flight_id: FlightId,
}

impl TestHarness {
    async fn new() -> Self {
        let store = InMemoryEventStore::new();
        let inventory: Arc<dyn SeatInventory> = Arc::new(LocalSeatInventory::new(store.clone()));
        Self::with_inventory(store, inventory).await
    }

    async fn with_inventory(store: InMemoryEventStore, inventory: Arc<dyn SeatInventory>) -> Self {
        let broker = InMemoryBroker::new();
        declare_topology(&broker).unwrap();
        let consumer = broker.consume(BOOKING_PAYMENT_EVENTS_QUEUE).unwrap();
        let provider = SandboxPaymentProvider::new();
        let read = Arc::new(ReadModels::new(store.clone()));

        let flight_id = FlightId::new();
        inventory
            .generate(flight_id, AircraftLayout::new(4, 12, 180))
            .await
            .unwrap();

        let coordinator = Arc::new(
            BookingCoordinator::new(
                store.clone(),
                inventory,
                read.clone(),
                Arc::new(broker.clone()),
            )
            .with_retry_policy(RetryPolicy::none()),
        );
        let ledger = Arc::new(
            PaymentLedger::new(
                store,
                Arc::new(provider.clone()),
                read,
                Arc::new(broker.clone()),
            )
            .with_retry_policy(RetryPolicy::none()),
        );

        Self {
            listener: PaymentEventListener::new(coordinator.clone()),
            coordinator,
            ledger,
            consumer,
            provider,
            broker,
            flight_id,
        }
    }

    fn request(&self, seats: &[&str]) -> CreateBooking {
        let passengers = seats
            .iter()
            .enumerate()
            .map(|(i, seat)| {
                Passenger::new(
                    format!("Passenger{i}"),
                    "Doe",
                    DocumentType::Passport,
                    format!("DOC{i}"),
                    *seat,
                )
            })
            .collect();
        CreateBooking::new(UserId::new(), self.flight_id, Money::from_units(250), passengers)
    }

    async fn seat_map(&self) -> SeatMap {
        self.coordinator
            .inventory()
            .seat_map(self.flight_id)
            .await
            .unwrap()
            .unwrap()
    }

    /// Delivers every queued payment event to the listener.
    async fn drain_payment_events(&self) -> usize {
        let mut handled = 0;
        while let Some(delivery) = self.consumer.try_recv() {
            self.listener.process(&self.consumer, delivery).await;
            handled += 1;
        }
        handled
    }
}

#[tokio::test]
async fn test_create_then_cancel_round_trip() {
    let h = TestHarness::new().await;
    let before = Utc::now();

    let booking = h
        .coordinator
        .create_booking(h.request(&["12A", "12B"]))
        .await
        .unwrap();
    let booking_id = booking.id().unwrap();

    assert_eq!(booking.status(), BookingStatus::Pending);
    assert_eq!(booking.reference().unwrap().as_str().len(), 6);
    let hold = booking.expires_at().unwrap() - before;
    assert!(hold >= Duration::minutes(15) && hold < Duration::minutes(16));

    let map = h.seat_map().await;
    assert_eq!(map.holder_of("12A"), Some(booking_id));
    assert_eq!(map.holder_of("12B"), Some(booking_id));
    assert_eq!(map.booked_seats(), 2);
    assert_eq!(map.available_seats() + map.booked_seats(), map.total_seats());

    let cancelled = h
        .coordinator
        .cancel_booking(booking_id, "Customer request")
        .await
        .unwrap();

    assert_eq!(cancelled.status(), BookingStatus::Cancelled);
    let map = h.seat_map().await;
    assert!(map.seat("12A").unwrap().is_available());
    assert!(map.seat("12B").unwrap().is_available());
    assert_eq!(map.booked_seats(), 0);
    assert_eq!(h.broker.published_with_key("booking.cancelled").len(), 1);
}

#[tokio::test]
async fn test_capture_confirms_booking_through_channel() {
    let h = TestHarness::new().await;
    let booking = h
        .coordinator
        .create_booking(h.request(&["3C"]))
        .await
        .unwrap();
    let booking_id = booking.id().unwrap();

    let initiated = h
        .ledger
        .initiate(InitiatePayment::new(
            booking_id,
            booking.total_price(),
            PaymentMethod::Paypal,
        ))
        .await
        .unwrap();
    let order_id = initiated.payment.provider_order_id().unwrap().to_string();
    assert!(initiated.approval_url.is_some());

    let payment = h.ledger.capture(&order_id).await.unwrap();
    assert_eq!(payment.status(), PaymentStatus::Completed);

    // payment.initiated is ignored, payment.completed confirms.
    assert_eq!(h.drain_payment_events().await, 2);

    let booking = h.coordinator.require_booking(booking_id).await.unwrap();
    assert_eq!(booking.status(), BookingStatus::Confirmed);
    assert_eq!(booking.payment_id(), payment.id());
    assert_eq!(h.broker.published_with_key("booking.confirmed").len(), 1);
    assert_eq!(h.seat_map().await.holder_of("3C"), Some(booking_id));
}

#[tokio::test]
async fn test_declined_capture_cancels_booking_and_frees_seats() {
    let h = TestHarness::new().await;
    let booking = h
        .coordinator
        .create_booking(h.request(&["7A", "7B"]))
        .await
        .unwrap();
    let booking_id = booking.id().unwrap();

    let initiated = h
        .ledger
        .initiate(InitiatePayment::new(
            booking_id,
            booking.total_price(),
            PaymentMethod::Paypal,
        ))
        .await
        .unwrap();
    h.provider.set_capture_status(Some("VOIDED"));

    let payment = h
        .ledger
        .capture(initiated.payment.provider_order_id().unwrap())
        .await
        .unwrap();
    assert_eq!(payment.failure_reason(), Some("Provider order status: VOIDED"));

    h.drain_payment_events().await;

    let booking = h.coordinator.require_booking(booking_id).await.unwrap();
    assert_eq!(booking.status(), BookingStatus::Cancelled);
    assert_eq!(
        booking.cancellation_reason(),
        Some("Payment failed: Provider order status: VOIDED")
    );
    assert_eq!(h.seat_map().await.booked_seats(), 0);
}

#[tokio::test]
async fn test_duplicate_completed_delivery_is_harmless() {
    let h = TestHarness::new().await;
    let booking = h
        .coordinator
        .create_booking(h.request(&["2D"]))
        .await
        .unwrap();
    let booking_id = booking.id().unwrap();

    let initiated = h
        .ledger
        .initiate(InitiatePayment::new(
            booking_id,
            booking.total_price(),
            PaymentMethod::Paypal,
        ))
        .await
        .unwrap();
    h.ledger
        .capture(initiated.payment.provider_order_id().unwrap())
        .await
        .unwrap();

    // A direct confirmation races the event.
    h.coordinator
        .confirm_booking(booking_id, initiated.payment.id().unwrap())
        .await
        .unwrap();
    h.drain_payment_events().await;

    assert_eq!(h.consumer.unacked_count(), 0);
    assert_eq!(h.broker.queue_depth(BOOKING_PAYMENT_EVENTS_QUEUE), 0);
    assert_eq!(h.broker.published_with_key("booking.confirmed").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_initiate_opens_one_provider_order() {
    let h = TestHarness::new().await;
    let booking_id = AggregateId::new();

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let ledger = h.ledger.clone();
            tokio::spawn(async move {
                ledger
                    .initiate(
                        InitiatePayment::new(
                            booking_id,
                            Money::from_units(100),
                            PaymentMethod::Paypal,
                        )
                        .with_currency("USD"),
                    )
                    .await
            })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        let initiated = task.await.unwrap().unwrap();
        ids.push(initiated.payment.id().unwrap());
    }

    assert_eq!(ids[0], ids[1]);
    assert_eq!(h.provider.order_count(), 1);
    assert_eq!(h.provider.create_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_for_one_seat() {
    let h = TestHarness::new().await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = h.coordinator.clone();
            let request = h.request(&["5F"]);
            tokio::spawn(async move { coordinator.create_booking(request).await })
        })
        .collect();

    let mut winners = Vec::new();
    for task in tasks {
        match task.await.unwrap() {
            Ok(booking) => winners.push(booking.id().unwrap()),
            Err(SagaError::SeatUnavailable { seat_number, .. }) => assert_eq!(seat_number, "5F"),
            Err(e) if e.is_conflict() => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(winners.len(), 1);
    let map = h.seat_map().await;
    assert_eq!(map.holder_of("5F"), Some(winners[0]));
    assert_eq!(map.booked_seats(), 1);
}

#[tokio::test]
async fn test_reaper_expires_abandoned_booking_once() {
    let h = TestHarness::new().await;
    let booking = h
        .coordinator
        .create_booking(h.request(&["10A", "10B"]))
        .await
        .unwrap();
    let booking_id = booking.id().unwrap();
    let reaper = ExpirationReaper::new(h.coordinator.clone());

    let sweep_at = booking.created_at().unwrap() + Duration::minutes(16);
    let report = reaper.run_once_at(sweep_at).await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.failed, 0);

    let booking = h.coordinator.require_booking(booking_id).await.unwrap();
    assert_eq!(booking.status(), BookingStatus::Expired);
    assert!(booking.closed_at().is_some());
    assert_eq!(h.seat_map().await.booked_seats(), 0);

    reaper.run_once_at(sweep_at).await.unwrap();
    assert_eq!(h.broker.published_with_key("booking.expired").len(), 1);

    // A late payment cannot revive the booking.
    let late = h
        .coordinator
        .confirm_booking(booking_id, AggregateId::new())
        .await;
    assert!(matches!(late, Err(SagaError::InvalidState(_))));
}

/// Seat inventory whose Nth reserve call fails.
struct FlakyInventory {
    inner: LocalSeatInventory<InMemoryEventStore>,
    fail_on_reserve: u32,
    reserve_calls: AtomicU32,
}

#[async_trait]
impl SeatInventory for FlakyInventory {
    async fn generate(&self, flight_id: FlightId, layout: AircraftLayout) -> saga::Result<SeatMap> {
        self.inner.generate(flight_id, layout).await
    }

    async fn reserve(
        &self,
        flight_id: FlightId,
        seat_number: &str,
        booking_id: AggregateId,
    ) -> saga::Result<bool> {
        let call = self.reserve_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_reserve {
            return Err(SagaError::Unavailable {
                collaborator: "seat inventory",
                reason: "timed out".to_string(),
            });
        }
        self.inner.reserve(flight_id, seat_number, booking_id).await
    }

    async fn release(
        &self,
        flight_id: FlightId,
        seat_number: &str,
        booking_id: AggregateId,
    ) -> saga::Result<()> {
        self.inner.release(flight_id, seat_number, booking_id).await
    }

    async fn seat_map(&self, flight_id: FlightId) -> saga::Result<Option<SeatMap>> {
        self.inner.seat_map(flight_id).await
    }
}

#[tokio::test]
async fn test_inventory_outage_mid_booking_releases_held_seats() {
    let store = InMemoryEventStore::new();
    let inventory = Arc::new(FlakyInventory {
        inner: LocalSeatInventory::new(store.clone()),
        fail_on_reserve: 3,
        reserve_calls: AtomicU32::new(0),
    });
    let h = TestHarness::with_inventory(store, inventory).await;

    let result = h
        .coordinator
        .create_booking(h.request(&["20A", "20B", "20C", "20D"]))
        .await;

    assert!(matches!(result, Err(SagaError::Unavailable { .. })));
    let map = h.seat_map().await;
    assert_eq!(map.booked_seats(), 0);
    assert!(h.broker.published_with_key("booking.created").is_empty());
}

#[tokio::test]
async fn test_taken_seat_reports_passenger_and_releases_others() {
    let h = TestHarness::new().await;
    let first = h
        .coordinator
        .create_booking(h.request(&["15E"]))
        .await
        .unwrap();

    let result = h
        .coordinator
        .create_booking(h.request(&["15C", "15D", "15E"]))
        .await;

    match result {
        Err(SagaError::SeatUnavailable {
            seat_number,
            passenger,
        }) => {
            assert_eq!(seat_number, "15E");
            assert_eq!(passenger, "Passenger2 Doe");
        }
        other => panic!("expected SeatUnavailable, got {other:?}"),
    }

    let map = h.seat_map().await;
    assert_eq!(map.booked_seats(), 1);
    assert_eq!(map.holder_of("15E"), first.id());
}
