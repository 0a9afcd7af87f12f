//! Seat map service.

use common::{AggregateId, FlightId};
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::command::CommandHandler;
use crate::error::DomainError;

use super::{AircraftLayout, SeatError, SeatMap};

/// How often a seat write is re-decided after losing a race for the stream.
///
/// Every flight has a single stream, so busy flights see conflicts between
/// unrelated seats; those must retry rather than fail.
const SEAT_WRITE_ATTEMPTS: u32 = 32;

impl From<SeatError> for DomainError {
    fn from(e: SeatError) -> Self {
        DomainError::Seat(e)
    }
}

/// Service for reserving and releasing seats.
pub struct SeatMapService<S: EventStore> {
    handler: CommandHandler<S, SeatMap>,
}

impl<S: EventStore> SeatMapService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, SeatMap> {
        &self.handler
    }

    /// Generates a flight's seats from a layout.
    ///
    /// If the flight already has seats they are kept unchanged and returned.
    #[tracing::instrument(skip(self))]
    pub async fn generate_seats(
        &self,
        flight_id: FlightId,
        layout: AircraftLayout,
    ) -> Result<SeatMap, DomainError> {
        let result = self
            .handler
            .execute_with_retry(flight_id.seat_map_id(), SEAT_WRITE_ATTEMPTS, |map| {
                map.generate(flight_id, layout)
            })
            .await?;

        if result.events.is_empty() {
            tracing::warn!(%flight_id, "Seats already generated, keeping existing map");
        } else {
            tracing::info!(
                %flight_id,
                total_seats = result.aggregate.total_seats(),
                "Seats generated"
            );
        }

        Ok(result.aggregate)
    }

    /// Attempts to take a seat for a booking.
    ///
    /// Returns `Ok(true)` when the booking holds the seat afterwards and
    /// `Ok(false)` when another booking holds it.
    #[tracing::instrument(skip(self))]
    pub async fn reserve_seat(
        &self,
        flight_id: FlightId,
        seat_number: &str,
        booking_id: AggregateId,
    ) -> Result<bool, DomainError> {
        let result = self
            .handler
            .execute_with_retry(flight_id.seat_map_id(), SEAT_WRITE_ATTEMPTS, |map| {
                map.reserve(seat_number, booking_id)
            })
            .await?;

        let held = result.aggregate.holder_of(seat_number) == Some(booking_id);
        if !held {
            tracing::info!(%flight_id, seat_number, "Seat already taken");
        }
        Ok(held)
    }

    /// Hands a booking's seat back.
    #[tracing::instrument(skip(self))]
    pub async fn release_seat(
        &self,
        flight_id: FlightId,
        seat_number: &str,
        booking_id: AggregateId,
    ) -> Result<(), DomainError> {
        self.handler
            .execute_with_retry(flight_id.seat_map_id(), SEAT_WRITE_ATTEMPTS, |map| {
                map.release(seat_number, booking_id)
            })
            .await?;
        Ok(())
    }

    /// Loads a flight's seat map, if seats were generated.
    pub async fn get_seat_map(&self, flight_id: FlightId) -> Result<Option<SeatMap>, DomainError> {
        self.handler.load_existing(flight_id.seat_map_id()).await
    }

    /// Loads a flight's seat map, failing when no seats were generated.
    pub async fn require_seat_map(&self, flight_id: FlightId) -> Result<SeatMap, DomainError> {
        self.get_seat_map(flight_id)
            .await?
            .ok_or_else(|| DomainError::AggregateNotFound {
                aggregate_type: SeatMap::aggregate_type(),
                aggregate_id: flight_id.to_string(),
            })
    }
}
