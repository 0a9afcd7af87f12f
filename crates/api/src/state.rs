//! Shared application state.

use std::sync::Arc;

use event_store::EventStore;
use messaging::{ChannelError, InMemoryBroker, declare_topology};
use saga::{
    BookingCoordinator, LocalSeatInventory, PaymentLedger, ReadModels, SandboxPaymentProvider,
    SeatInventory,
};

use crate::config::Config;

/// Services behind the HTTP handlers, the listener and the reaper.
pub struct AppState<S: EventStore + Clone> {
    pub coordinator: Arc<BookingCoordinator<S>>,
    pub ledger: Arc<PaymentLedger<S>>,
    pub inventory: Arc<dyn SeatInventory>,
    pub broker: InMemoryBroker,
}

/// Wires the saga over `event_store` with the local seat inventory, the
/// sandbox payment provider and an in-process event channel.
pub fn create_default_state<S: EventStore + Clone + 'static>(
    event_store: S,
    config: &Config,
) -> Result<Arc<AppState<S>>, ChannelError> {
    // Consumers read from queues; the server keeps no publish log.
    let broker = InMemoryBroker::with_publish_log(0);
    declare_topology(&broker)?;

    let read = Arc::new(ReadModels::new(event_store.clone()));
    let inventory: Arc<dyn SeatInventory> =
        Arc::new(LocalSeatInventory::new(event_store.clone()));

    let coordinator = BookingCoordinator::new(
        event_store.clone(),
        inventory.clone(),
        read.clone(),
        Arc::new(broker.clone()),
    )
    .with_hold(chrono::Duration::minutes(config.booking_hold_minutes));

    let ledger = PaymentLedger::new(
        event_store,
        Arc::new(SandboxPaymentProvider::new()),
        read,
        Arc::new(broker.clone()),
    )
    .with_urls(config.provider_urls());

    Ok(Arc::new(AppState {
        coordinator: Arc::new(coordinator),
        ledger: Arc::new(ledger),
        inventory,
        broker,
    }))
}
