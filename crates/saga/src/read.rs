//! Read models shared by the booking and payment sides.

use event_store::EventStore;
use projections::{BookingsView, PaymentsView, ProjectionProcessor};

use crate::error::Result;

/// Bookings and payments views behind one processor.
///
/// Queries call [`ReadModels::catch_up`] first, so a caller always sees its
/// own committed writes.
pub struct ReadModels<S: EventStore> {
    processor: ProjectionProcessor<S>,
    bookings: BookingsView,
    payments: PaymentsView,
}

impl<S: EventStore> ReadModels<S> {
    pub fn new(store: S) -> Self {
        let bookings = BookingsView::new();
        let payments = PaymentsView::new();

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(bookings.clone()));
        processor.register(Box::new(payments.clone()));

        Self {
            processor,
            bookings,
            payments,
        }
    }

    pub async fn catch_up(&self) -> Result<()> {
        self.processor.run_catch_up().await?;
        Ok(())
    }

    pub fn bookings(&self) -> &BookingsView {
        &self.bookings
    }

    pub fn payments(&self) -> &PaymentsView {
        &self.payments
    }
}
