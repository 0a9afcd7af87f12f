use chrono::Duration;
use common::{FlightId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{BookingService, CreateBooking, DocumentType, Money, Passenger};
use event_store::InMemoryEventStore;
use projections::{BookingsView, ProjectionProcessor};

async fn populate_store(store: &InMemoryEventStore, n: usize) {
    let service = BookingService::new(store.clone());
    for i in 0..n {
        let cmd = CreateBooking::new(
            UserId::new(),
            FlightId::new(),
            Money::from_units(100),
            vec![Passenger::new(
                "Bench",
                "Passenger",
                DocumentType::Passport,
                format!("P-{i}"),
                "1A",
            )],
        );
        service
            .create_booking(&cmd, Duration::minutes(15))
            .await
            .unwrap();
    }
}

fn bench_catch_up(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, 200));

    c.bench_function("bookings_view_catch_up_200", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut processor = ProjectionProcessor::new(store.clone());
                processor.register(Box::new(BookingsView::new()));
                processor.run_catch_up().await.unwrap()
            })
        });
    });
}

fn bench_pending_scan(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let view = BookingsView::new();
    rt.block_on(async {
        populate_store(&store, 500).await;
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(view.clone()));
        processor.run_catch_up().await.unwrap();
    });
    let later = chrono::Utc::now() + Duration::minutes(30);

    c.bench_function("pending_expired_scan_500", |b| {
        b.iter(|| rt.block_on(view.pending_expired(later)).len());
    });
}

criterion_group!(benches, bench_catch_up, bench_pending_scan);
criterion_main!(benches);
