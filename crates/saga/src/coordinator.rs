//! Booking saga: seat holds, booking lifecycle and compensation.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, FlightId, UserId};
use domain::{
    Aggregate, Booking, BookingReference, BookingService, CancelBooking, ConfirmBooking,
    CreateBooking,
};
use event_store::EventStore;
use messaging::{BookingEventType, EventPublisher};
use projections::BookingSummary;

use crate::error::{Result, SagaError};
use crate::inventory::SeatInventory;
use crate::read::ReadModels;
use crate::retry::RetryPolicy;
use crate::wire;

/// Default time a pending booking holds its seats.
pub const DEFAULT_HOLD_MINUTES: i64 = 15;

/// Seats reserved so far during one booking creation.
struct SeatHolds {
    flight_id: FlightId,
    booking_id: AggregateId,
    seats: Vec<String>,
}

impl SeatHolds {
    fn new(flight_id: FlightId, booking_id: AggregateId) -> Self {
        Self {
            flight_id,
            booking_id,
            seats: Vec::new(),
        }
    }
}

/// Orchestrates bookings against seat inventory.
///
/// Creation reserves one seat per passenger and persists the booking only
/// when every seat is held; on any failure the seats reserved so far are
/// released before the error is returned. Cancel and expire persist the
/// terminal state first and release seats afterwards.
pub struct BookingCoordinator<S: EventStore + Clone> {
    bookings: BookingService<S>,
    inventory: Arc<dyn SeatInventory>,
    read: Arc<ReadModels<S>>,
    publisher: Arc<dyn EventPublisher>,
    retry: RetryPolicy,
    hold: Duration,
}

impl<S: EventStore + Clone> BookingCoordinator<S> {
    pub fn new(
        store: S,
        inventory: Arc<dyn SeatInventory>,
        read: Arc<ReadModels<S>>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            bookings: BookingService::new(store),
            inventory,
            read,
            publisher,
            retry: RetryPolicy::seat_inventory(),
            hold: Duration::minutes(DEFAULT_HOLD_MINUTES),
        }
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn inventory(&self) -> &Arc<dyn SeatInventory> {
        &self.inventory
    }

    /// Creates a pending booking holding one seat per passenger.
    #[tracing::instrument(skip(self, cmd), fields(booking_id = %cmd.booking_id, flight_id = %cmd.flight_id))]
    pub async fn create_booking(&self, cmd: CreateBooking) -> Result<Booking> {
        let started = Instant::now();
        Booking::validate_new(&cmd).map_err(domain::DomainError::Booking)?;

        let mut holds = SeatHolds::new(cmd.flight_id, cmd.booking_id);
        let outcome = self.reserve_and_persist(&cmd, &mut holds).await;

        let booking = match outcome {
            Ok(booking) => booking,
            Err(e) => {
                self.compensate(holds).await;
                return Err(e);
            }
        };

        wire::publish_booking(
            self.publisher.as_ref(),
            &booking,
            BookingEventType::BookingCreated,
        )
        .await;

        metrics::counter!("bookings_created_total").increment(1);
        metrics::histogram!("booking_create_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            reference = ?booking.reference().map(BookingReference::as_str),
            seats = booking.passengers().len(),
            "Booking created"
        );

        Ok(booking)
    }

    async fn reserve_and_persist(
        &self,
        cmd: &CreateBooking,
        holds: &mut SeatHolds,
    ) -> Result<Booking> {
        for passenger in &cmd.passengers {
            let seat = passenger.seat_number.as_str();
            let reserved = self
                .retry
                .run("seat_reserve", || {
                    self.inventory.reserve(cmd.flight_id, seat, cmd.booking_id)
                })
                .await?;

            if !reserved {
                metrics::counter!("booking_seat_conflicts_total").increment(1);
                tracing::info!(seat_number = seat, "Seat unavailable");
                return Err(SagaError::SeatUnavailable {
                    seat_number: seat.to_string(),
                    passenger: passenger.full_name(),
                });
            }
            holds.seats.push(seat.to_string());
        }

        let result = self.bookings.create_booking(cmd, self.hold).await?;
        Ok(result.aggregate)
    }

    /// Releases every seat in `holds`, newest first. Failures are logged;
    /// the original error is what the caller sees.
    async fn compensate(&self, holds: SeatHolds) {
        for seat in holds.seats.iter().rev() {
            let released = self
                .retry
                .run("seat_release", || {
                    self.inventory
                        .release(holds.flight_id, seat, holds.booking_id)
                })
                .await;

            match released {
                Ok(()) => {
                    metrics::counter!("seat_compensations_total").increment(1);
                    tracing::info!(
                        booking_id = %holds.booking_id,
                        seat_number = %seat,
                        "Compensated seat reservation"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        booking_id = %holds.booking_id,
                        seat_number = %seat,
                        error = %e,
                        "Failed to release seat during compensation"
                    );
                }
            }
        }
    }

    /// Confirms a pending booking with the payment that settled it.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_booking(
        &self,
        booking_id: AggregateId,
        payment_id: AggregateId,
    ) -> Result<Booking> {
        let booking = self
            .bookings
            .confirm_booking(ConfirmBooking::new(booking_id, payment_id))
            .await?
            .aggregate;

        wire::publish_booking(
            self.publisher.as_ref(),
            &booking,
            BookingEventType::BookingConfirmed,
        )
        .await;
        metrics::counter!("bookings_confirmed_total").increment(1);
        tracing::info!("Booking confirmed");

        Ok(booking)
    }

    /// Cancels a pending booking and releases its seats.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_booking(&self, booking_id: AggregateId, reason: &str) -> Result<Booking> {
        let booking = self
            .bookings
            .cancel_booking(CancelBooking::new(booking_id, reason))
            .await?
            .aggregate;

        self.release_seats(&booking).await;
        wire::publish_booking(
            self.publisher.as_ref(),
            &booking,
            BookingEventType::BookingCancelled,
        )
        .await;
        metrics::counter!("bookings_cancelled_total").increment(1);
        tracing::info!(reason, "Booking cancelled");

        Ok(booking)
    }

    /// Expires a pending booking whose deadline is before `now` and releases
    /// its seats.
    #[tracing::instrument(skip(self))]
    pub async fn expire_booking(
        &self,
        booking_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let booking = self
            .bookings
            .expire_booking(booking_id, now)
            .await?
            .aggregate;

        self.release_seats(&booking).await;
        wire::publish_booking(
            self.publisher.as_ref(),
            &booking,
            BookingEventType::BookingExpired,
        )
        .await;
        metrics::counter!("bookings_expired_total").increment(1);
        tracing::info!("Booking expired");

        Ok(booking)
    }

    async fn release_seats(&self, booking: &Booking) {
        let (Some(booking_id), Some(flight_id)) = (booking.id(), booking.flight_id()) else {
            return;
        };

        for seat in booking.seat_numbers() {
            let released = self
                .retry
                .run("seat_release", || {
                    self.inventory.release(flight_id, seat, booking_id)
                })
                .await;

            if let Err(e) = released {
                tracing::error!(
                    %booking_id,
                    seat_number = seat,
                    error = %e,
                    "Failed to release seat"
                );
            }
        }
    }

    pub async fn get_booking(&self, booking_id: AggregateId) -> Result<Option<Booking>> {
        Ok(self.bookings.get_booking(booking_id).await?)
    }

    pub async fn require_booking(&self, booking_id: AggregateId) -> Result<Booking> {
        self.get_booking(booking_id)
            .await?
            .ok_or_else(|| SagaError::NotFound(format!("Booking not found: {booking_id}")))
    }

    /// Finds a booking by its six-character reference.
    pub async fn get_booking_by_reference(&self, reference: &str) -> Result<Booking> {
        let parsed = BookingReference::parse(reference).map_err(domain::DomainError::Booking)?;
        self.bookings
            .get_booking_by_reference(&parsed)
            .await?
            .ok_or_else(|| SagaError::NotFound(format!("Booking not found: {parsed}")))
    }

    /// Lists a user's bookings, newest first.
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        self.read.catch_up().await?;
        let summaries = self.read.bookings().get_by_user(user_id).await;
        self.load_all(&summaries).await
    }

    /// Pending bookings whose deadline is before `now`.
    pub async fn overdue_bookings(&self, now: DateTime<Utc>) -> Result<Vec<BookingSummary>> {
        self.read.catch_up().await?;
        Ok(self.read.bookings().pending_expired(now).await)
    }

    async fn load_all(&self, summaries: &[BookingSummary]) -> Result<Vec<Booking>> {
        let mut bookings = Vec::with_capacity(summaries.len());
        for summary in summaries {
            if let Some(booking) = self.bookings.get_booking(summary.booking_id).await? {
                bookings.push(booking);
            }
        }
        Ok(bookings)
    }
}
