//! Bookings read model: lookup by reference and user, and the reaper's
//! pending-and-overdue scan.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, FlightId, UserId};
use domain::{Aggregate, Booking, BookingEvent, BookingStatus, Money};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition, ReadModel};

/// Denormalized booking row.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingSummary {
    pub booking_id: AggregateId,
    pub reference: String,
    pub user_id: UserId,
    pub flight_id: FlightId,
    pub status: BookingStatus,
    pub total_price: Money,
    pub seat_numbers: Vec<String>,
    pub payment_id: Option<AggregateId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    bookings: HashMap<AggregateId, BookingSummary>,
    by_reference: HashMap<String, AggregateId>,
}

/// Read model over every booking ever created.
#[derive(Clone)]
pub struct BookingsView {
    state: Arc<RwLock<State>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl BookingsView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    pub async fn get(&self, booking_id: AggregateId) -> Option<BookingSummary> {
        self.state.read().await.bookings.get(&booking_id).cloned()
    }

    pub async fn get_by_reference(&self, reference: &str) -> Option<BookingSummary> {
        let state = self.state.read().await;
        state
            .by_reference
            .get(reference)
            .and_then(|id| state.bookings.get(id))
            .cloned()
    }

    /// Gets a user's bookings, newest first.
    pub async fn get_by_user(&self, user_id: UserId) -> Vec<BookingSummary> {
        let mut bookings: Vec<_> = self
            .state
            .read()
            .await
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }

    /// Gets pending bookings whose deadline is before `now`, oldest deadline first.
    pub async fn pending_expired(&self, now: DateTime<Utc>) -> Vec<BookingSummary> {
        let mut overdue: Vec<_> = self
            .state
            .read()
            .await
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.expires_at < now)
            .cloned()
            .collect();
        overdue.sort_by_key(|b| b.expires_at);
        overdue
    }
}

impl Default for BookingsView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for BookingsView {
    fn name(&self) -> &'static str {
        "BookingsView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type == Booking::aggregate_type() {
            let booking_event: BookingEvent = serde_json::from_value(event.payload.clone())?;
            let booking_id = event.aggregate_id;
            let mut state = self.state.write().await;

            match booking_event {
                BookingEvent::BookingCreated(data) => {
                    let reference = data.reference.as_str().to_string();
                    state.by_reference.insert(reference.clone(), booking_id);
                    state.bookings.insert(
                        booking_id,
                        BookingSummary {
                            booking_id,
                            reference,
                            user_id: data.user_id,
                            flight_id: data.flight_id,
                            status: BookingStatus::Pending,
                            total_price: data.total_price,
                            seat_numbers: data
                                .passengers
                                .iter()
                                .map(|p| p.seat_number.clone())
                                .collect(),
                            payment_id: None,
                            created_at: data.created_at,
                            expires_at: data.expires_at,
                            updated_at: data.created_at,
                        },
                    );
                }
                BookingEvent::BookingConfirmed(data) => {
                    if let Some(booking) = state.bookings.get_mut(&booking_id) {
                        booking.status = BookingStatus::Confirmed;
                        booking.payment_id = Some(data.payment_id);
                        booking.updated_at = data.confirmed_at;
                    }
                }
                BookingEvent::BookingCancelled(data) => {
                    if let Some(booking) = state.bookings.get_mut(&booking_id) {
                        booking.status = BookingStatus::Cancelled;
                        booking.updated_at = data.cancelled_at;
                    }
                }
                BookingEvent::BookingExpired(data) => {
                    if let Some(booking) = state.bookings.get_mut(&booking_id) {
                        booking.status = BookingStatus::Expired;
                        booking.updated_at = data.expired_at;
                    }
                }
            }
        }

        let mut pos = self.position.write().await;
        *pos = pos.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = State::default();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for BookingsView {
    fn name(&self) -> &'static str {
        "BookingsView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.bookings.len()).unwrap_or(0)
    }
}
