//! Seat inventory collaborator.

use async_trait::async_trait;
use common::{AggregateId, FlightId};
use domain::{AircraftLayout, SeatMap, SeatMapService};
use event_store::EventStore;

use crate::error::Result;

/// Operations the booking saga needs from seat inventory.
///
/// Every call stands for one request/response round trip; the booking saga
/// makes one `reserve` call per passenger.
#[async_trait]
pub trait SeatInventory: Send + Sync {
    /// Lays out a flight's seats. A flight that already has seats keeps them.
    async fn generate(&self, flight_id: FlightId, layout: AircraftLayout) -> Result<SeatMap>;

    /// Takes a seat for a booking. `Ok(false)` means another booking holds it.
    async fn reserve(
        &self,
        flight_id: FlightId,
        seat_number: &str,
        booking_id: AggregateId,
    ) -> Result<bool>;

    /// Hands a seat back. Releasing an available seat is a no-op; releasing a
    /// seat another booking holds is `InvalidState`.
    async fn release(
        &self,
        flight_id: FlightId,
        seat_number: &str,
        booking_id: AggregateId,
    ) -> Result<()>;

    /// Loads a flight's seats; `None` if none were generated.
    async fn seat_map(&self, flight_id: FlightId) -> Result<Option<SeatMap>>;
}

/// Seat inventory backed by the seat map aggregate in the local event store.
pub struct LocalSeatInventory<S: EventStore> {
    seats: SeatMapService<S>,
}

impl<S: EventStore> LocalSeatInventory<S> {
    pub fn new(store: S) -> Self {
        Self {
            seats: SeatMapService::new(store),
        }
    }
}

#[async_trait]
impl<S: EventStore> SeatInventory for LocalSeatInventory<S> {
    async fn generate(&self, flight_id: FlightId, layout: AircraftLayout) -> Result<SeatMap> {
        Ok(self.seats.generate_seats(flight_id, layout).await?)
    }

    async fn reserve(
        &self,
        flight_id: FlightId,
        seat_number: &str,
        booking_id: AggregateId,
    ) -> Result<bool> {
        Ok(self
            .seats
            .reserve_seat(flight_id, seat_number, booking_id)
            .await?)
    }

    async fn release(
        &self,
        flight_id: FlightId,
        seat_number: &str,
        booking_id: AggregateId,
    ) -> Result<()> {
        Ok(self
            .seats
            .release_seat(flight_id, seat_number, booking_id)
            .await?)
    }

    async fn seat_map(&self, flight_id: FlightId) -> Result<Option<SeatMap>> {
        Ok(self.seats.get_seat_map(flight_id).await?)
    }
}
