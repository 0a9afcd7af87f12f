//! Booking aggregate implementation.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, FlightId, UserId};
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{
    BookingError, BookingEvent, BookingReference, BookingStatus, CreateBooking, Passenger,
    events::BookingCreatedData,
};

/// Booking aggregate root.
///
/// A booking holds its passengers' seats while `Pending`; every other status
/// is terminal.
#[derive(Debug, Clone, Default)]
pub struct Booking {
    id: Option<AggregateId>,
    version: Version,
    reference: Option<BookingReference>,
    user_id: Option<UserId>,
    flight_id: Option<FlightId>,
    status: BookingStatus,
    total_price: Money,
    passengers: Vec<Passenger>,
    payment_id: Option<AggregateId>,
    cancellation_reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    /// When the booking reached its terminal status.
    closed_at: Option<DateTime<Utc>>,
}

impl Aggregate for Booking {
    type Event = BookingEvent;
    type Error = BookingError;

    fn aggregate_type() -> &'static str {
        "Booking"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            BookingEvent::BookingCreated(data) => self.apply_booking_created(data),
            BookingEvent::BookingConfirmed(data) => {
                self.status = BookingStatus::Confirmed;
                self.payment_id = Some(data.payment_id);
                self.close(data.confirmed_at);
            }
            BookingEvent::BookingCancelled(data) => {
                self.status = BookingStatus::Cancelled;
                self.cancellation_reason = Some(data.reason);
                self.close(data.cancelled_at);
            }
            BookingEvent::BookingExpired(data) => {
                self.status = BookingStatus::Expired;
                self.close(data.expired_at);
            }
        }
    }
}

// Query methods
impl Booking {
    pub fn reference(&self) -> Option<&BookingReference> {
        self.reference.as_ref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn flight_id(&self) -> Option<FlightId> {
        self.flight_id
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn passengers(&self) -> &[Passenger] {
        &self.passengers
    }

    /// Returns the seat numbers held by this booking, in passenger order.
    pub fn seat_numbers(&self) -> impl Iterator<Item = &str> {
        self.passengers.iter().map(|p| p.seat_number.as_str())
    }

    pub fn payment_id(&self) -> Option<AggregateId> {
        self.payment_id
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at.filter(|_| self.status == BookingStatus::Confirmed)
    }

    /// Set for cancelled bookings only; expiry is reported by `closed_at`.
    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at.filter(|_| self.status == BookingStatus::Cancelled)
    }

    /// Returns true if the booking is still pending past its hold window.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending && self.expires_at.is_some_and(|at| at < now)
    }
}

// Command methods (return events)
impl Booking {
    /// Checks a create request without touching any state.
    ///
    /// Run before seats are reserved so that malformed requests never hold
    /// inventory.
    pub fn validate_new(cmd: &CreateBooking) -> Result<(), BookingError> {
        if cmd.passengers.is_empty() {
            return Err(BookingError::NoPassengers);
        }

        if !cmd.total_price.is_positive() {
            return Err(BookingError::InvalidPrice {
                price: cmd.total_price.cents(),
            });
        }

        let mut seats = HashSet::with_capacity(cmd.passengers.len());
        for passenger in &cmd.passengers {
            passenger.validate()?;
            if !seats.insert(passenger.seat_number.as_str()) {
                return Err(BookingError::DuplicateSeat {
                    seat_number: passenger.seat_number.clone(),
                });
            }
        }

        Ok(())
    }

    /// Creates the booking in `Pending`, holding seats for `hold`.
    pub fn create(
        &self,
        cmd: &CreateBooking,
        reference: BookingReference,
        hold: Duration,
    ) -> Result<Vec<BookingEvent>, BookingError> {
        if self.id.is_some() {
            return Err(BookingError::AlreadyCreated);
        }

        Self::validate_new(cmd)?;

        let created_at = Utc::now();
        Ok(vec![BookingEvent::BookingCreated(BookingCreatedData {
            booking_id: cmd.booking_id,
            reference,
            user_id: cmd.user_id,
            flight_id: cmd.flight_id,
            total_price: cmd.total_price,
            passengers: cmd.passengers.clone(),
            created_at,
            expires_at: created_at + hold,
        })])
    }

    /// Confirms the booking with the payment that settled it.
    pub fn confirm(&self, payment_id: AggregateId) -> Result<Vec<BookingEvent>, BookingError> {
        if !self.status.can_confirm() {
            return Err(self.invalid_transition("confirm"));
        }

        Ok(vec![BookingEvent::booking_confirmed(payment_id)])
    }

    /// Cancels the booking.
    pub fn cancel(&self, reason: impl Into<String>) -> Result<Vec<BookingEvent>, BookingError> {
        if !self.status.can_cancel() {
            return Err(self.invalid_transition("cancel"));
        }

        Ok(vec![BookingEvent::booking_cancelled(reason)])
    }

    /// Expires the booking once its hold window has passed.
    pub fn expire(&self, now: DateTime<Utc>) -> Result<Vec<BookingEvent>, BookingError> {
        if !self.status.can_expire() {
            return Err(self.invalid_transition("expire"));
        }

        match self.expires_at {
            Some(expires_at) if expires_at < now => {
                Ok(vec![BookingEvent::booking_expired(now)])
            }
            Some(expires_at) => Err(BookingError::NotYetExpired { expires_at }),
            None => Err(self.invalid_transition("expire")),
        }
    }

    fn invalid_transition(&self, action: &'static str) -> BookingError {
        BookingError::InvalidStateTransition {
            current_state: self.status,
            action,
        }
    }
}

// Apply event helpers
impl Booking {
    fn apply_booking_created(&mut self, data: BookingCreatedData) {
        self.id = Some(data.booking_id);
        self.reference = Some(data.reference);
        self.user_id = Some(data.user_id);
        self.flight_id = Some(data.flight_id);
        self.status = BookingStatus::Pending;
        self.total_price = data.total_price;
        self.passengers = data.passengers;
        self.created_at = Some(data.created_at);
        self.updated_at = Some(data.created_at);
        self.expires_at = Some(data.expires_at);
    }

    fn close(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
        self.closed_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::DocumentType;

    fn passenger(seat: &str) -> Passenger {
        Passenger::new("Ada", "Lovelace", DocumentType::Passport, "P123", seat)
    }

    fn create_cmd(seats: &[&str]) -> CreateBooking {
        CreateBooking::new(
            UserId::new(),
            FlightId::new(),
            Money::from_cents(24_990),
            seats.iter().map(|s| passenger(s)).collect(),
        )
    }

    fn pending_booking() -> Booking {
        let mut booking = Booking::default();
        let events = booking
            .create(
                &create_cmd(&["12A", "12B"]),
                BookingReference::generate(),
                Duration::minutes(15),
            )
            .unwrap();
        booking.apply_events(events);
        booking
    }

    #[test]
    fn test_create_booking() {
        let booking = pending_booking();

        assert!(booking.id().is_some());
        assert_eq!(booking.status(), BookingStatus::Pending);
        assert_eq!(booking.seat_numbers().collect::<Vec<_>>(), vec!["12A", "12B"]);
        assert_eq!(
            booking.expires_at().unwrap() - booking.created_at().unwrap(),
            Duration::minutes(15)
        );
    }

    #[test]
    fn test_create_twice_fails() {
        let booking = pending_booking();
        let result = booking.create(
            &create_cmd(&["1A"]),
            BookingReference::generate(),
            Duration::minutes(15),
        );
        assert!(matches!(result, Err(BookingError::AlreadyCreated)));
    }

    #[test]
    fn test_validation_rules() {
        assert!(matches!(
            Booking::validate_new(&create_cmd(&[])),
            Err(BookingError::NoPassengers)
        ));

        assert!(matches!(
            Booking::validate_new(&create_cmd(&["3C", "3C"])),
            Err(BookingError::DuplicateSeat { .. })
        ));

        let mut free = create_cmd(&["3C"]);
        free.total_price = Money::zero();
        assert!(matches!(
            Booking::validate_new(&free),
            Err(BookingError::InvalidPrice { price: 0 })
        ));
    }

    #[test]
    fn test_confirm_from_pending() {
        let mut booking = pending_booking();
        let payment_id = AggregateId::new();

        booking.apply_events(booking.confirm(payment_id).unwrap());

        assert_eq!(booking.status(), BookingStatus::Confirmed);
        assert_eq!(booking.payment_id(), Some(payment_id));
        assert!(booking.closed_at().is_some());
        assert_eq!(booking.confirmed_at(), booking.closed_at());
        assert_eq!(booking.cancelled_at(), None);
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let mut booking = pending_booking();
        booking.apply_events(booking.cancel("changed plans").unwrap());

        assert_eq!(booking.cancellation_reason(), Some("changed plans"));
        assert!(booking.cancelled_at().is_some());
        assert_eq!(booking.confirmed_at(), None);
        assert!(matches!(
            booking.confirm(AggregateId::new()),
            Err(BookingError::InvalidStateTransition {
                current_state: BookingStatus::Cancelled,
                action: "confirm"
            })
        ));
        assert!(booking.cancel("again").is_err());
        assert!(booking.expire(Utc::now() + Duration::hours(1)).is_err());
    }

    #[test]
    fn test_expire_only_after_hold_window() {
        let mut booking = pending_booking();
        let expires_at = booking.expires_at().unwrap();

        assert!(matches!(
            booking.expire(expires_at - Duration::minutes(1)),
            Err(BookingError::NotYetExpired { .. })
        ));
        assert!(!booking.is_overdue(expires_at));

        let later = expires_at + Duration::minutes(1);
        assert!(booking.is_overdue(later));
        booking.apply_events(booking.expire(later).unwrap());

        assert_eq!(booking.status(), BookingStatus::Expired);
        assert_eq!(booking.closed_at(), Some(later));
        assert_eq!(booking.cancelled_at(), None);
        assert_eq!(booking.confirmed_at(), None);
        assert!(!booking.is_overdue(later));
    }
}
