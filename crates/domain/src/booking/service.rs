//! Booking service providing a simplified API for booking operations.

use chrono::{DateTime, Duration, Utc};
use common::AggregateId;
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    Booking, BookingError, BookingReference, CancelBooking, ConfirmBooking, CreateBooking,
    ReferenceClaim,
};

/// Attempts at drawing an unused booking reference.
const REFERENCE_ATTEMPTS: u32 = 5;

/// Attempts at a booking status change when a concurrent writer interferes.
const STATUS_WRITE_ATTEMPTS: u32 = 5;

impl From<BookingError> for DomainError {
    fn from(e: BookingError) -> Self {
        DomainError::Booking(e)
    }
}

/// Service for managing bookings.
///
/// Wraps the booking command handler and the reference claim handler.
pub struct BookingService<S: EventStore + Clone> {
    handler: CommandHandler<S, Booking>,
    claims: CommandHandler<S, ReferenceClaim>,
}

impl<S: EventStore + Clone> BookingService<S> {
    /// Creates a new booking service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store.clone()),
            claims: CommandHandler::new(store),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Booking> {
        &self.handler
    }

    /// Creates a booking under a freshly claimed reference.
    #[tracing::instrument(skip(self, cmd), fields(booking_id = %cmd.booking_id))]
    pub async fn create_booking(
        &self,
        cmd: &CreateBooking,
        hold: Duration,
    ) -> Result<CommandResult<Booking>, DomainError> {
        Booking::validate_new(cmd)?;

        let reference = self.claim_reference(cmd.booking_id).await?;

        self.handler
            .execute(cmd.booking_id, |booking| {
                booking.create(cmd, reference, hold)
            })
            .await
    }

    /// Confirms a pending booking.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_booking(
        &self,
        cmd: ConfirmBooking,
    ) -> Result<CommandResult<Booking>, DomainError> {
        let payment_id = cmd.payment_id;
        self.execute_existing(cmd.booking_id, |booking| booking.confirm(payment_id))
            .await
    }

    /// Cancels a pending booking.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_booking(
        &self,
        cmd: CancelBooking,
    ) -> Result<CommandResult<Booking>, DomainError> {
        let reason = cmd.reason.as_str();
        self.execute_existing(cmd.booking_id, |booking| booking.cancel(reason))
            .await
    }

    /// Expires a pending booking whose hold window ended before `now`.
    #[tracing::instrument(skip(self))]
    pub async fn expire_booking(
        &self,
        booking_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Booking>, DomainError> {
        self.execute_existing(booking_id, |booking| booking.expire(now))
            .await
    }

    /// Gets a booking by ID.
    pub async fn get_booking(&self, booking_id: AggregateId) -> Result<Option<Booking>, DomainError> {
        self.handler.load_existing(booking_id).await
    }

    /// Gets a booking by its reference code.
    pub async fn get_booking_by_reference(
        &self,
        reference: &BookingReference,
    ) -> Result<Option<Booking>, DomainError> {
        let claim = self.claims.load_existing(reference.claim_id()).await?;
        match claim.and_then(|c| c.booking_id()) {
            Some(booking_id) => self.get_booking(booking_id).await,
            None => Ok(None),
        }
    }

    async fn claim_reference(
        &self,
        booking_id: AggregateId,
    ) -> Result<BookingReference, DomainError> {
        let mut attempt = 1;
        loop {
            let reference = BookingReference::generate();
            let claimed = self
                .claims
                .execute(reference.claim_id(), |claim| {
                    claim.claim(&reference, booking_id)
                })
                .await;

            match claimed {
                Ok(_) => return Ok(reference),
                Err(e) if attempt < REFERENCE_ATTEMPTS && is_reference_collision(&e) => {
                    tracing::debug!(%reference, attempt, "Booking reference collision");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_existing<F>(
        &self,
        booking_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<Booking>, DomainError>
    where
        F: Fn(&Booking) -> Result<Vec<<Booking as Aggregate>::Event>, BookingError>,
    {
        if self.handler.load_existing(booking_id).await?.is_none() {
            return Err(DomainError::AggregateNotFound {
                aggregate_type: Booking::aggregate_type(),
                aggregate_id: booking_id.to_string(),
            });
        }

        self.handler
            .execute_with_retry(booking_id, STATUS_WRITE_ATTEMPTS, command_fn)
            .await
    }
}

fn is_reference_collision(error: &DomainError) -> bool {
    error.is_conflict()
        || matches!(
            error,
            DomainError::Booking(BookingError::ReferenceTaken { .. })
        )
}
