//! Seat map aggregate implementation.

use std::collections::HashMap;

use common::{AggregateId, FlightId};
use event_store::Version;

use crate::aggregate::Aggregate;

use super::{
    AircraftLayout, MAX_SEATS, Seat, SeatError, SeatMapEvent, SeatStatus,
    events::{SeatReleasedData, SeatReservedData, SeatsGeneratedData},
};

/// Seat map aggregate root.
///
/// One stream per flight, keyed by [`FlightId::seat_map_id`]. Every reserve
/// and release is appended against the version the decision was made on, so
/// two bookings can never both take the same seat.
#[derive(Debug, Clone, Default)]
pub struct SeatMap {
    id: Option<AggregateId>,
    version: Version,
    flight_id: Option<FlightId>,
    layout: AircraftLayout,

    /// Seats in generation order.
    seats: Vec<Seat>,

    /// Seat number to position in `seats`.
    index: HashMap<String, usize>,

    available_seats: u32,
    booked_seats: u32,
}

impl Aggregate for SeatMap {
    type Event = SeatMapEvent;
    type Error = SeatError;

    fn aggregate_type() -> &'static str {
        "SeatMap"
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
            SeatMapEvent::SeatsGenerated(data) => self.apply_seats_generated(data),
            SeatMapEvent::SeatReserved(data) => self.apply_seat_reserved(data),
            SeatMapEvent::SeatReleased(data) => self.apply_seat_released(data),
        }
    }
}

// Query methods
impl SeatMap {
    pub fn flight_id(&self) -> Option<FlightId> {
        self.flight_id
    }

    pub fn layout(&self) -> AircraftLayout {
        self.layout
    }

    pub fn is_generated(&self) -> bool {
        self.id.is_some()
    }

    /// Returns every seat in generation order.
    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.seats.iter()
    }

    /// Returns the seats that can still be reserved.
    pub fn available(&self) -> impl Iterator<Item = &Seat> {
        self.seats.iter().filter(|s| s.is_available())
    }

    pub fn seat(&self, seat_number: &str) -> Option<&Seat> {
        self.index.get(seat_number).map(|&i| &self.seats[i])
    }

    /// Returns the booking holding the seat, if any.
    pub fn holder_of(&self, seat_number: &str) -> Option<AggregateId> {
        self.seat(seat_number).and_then(|s| s.reserved_by)
    }

    pub fn total_seats(&self) -> u32 {
        self.seats.len() as u32
    }

    pub fn available_seats(&self) -> u32 {
        self.available_seats
    }

    pub fn booked_seats(&self) -> u32 {
        self.booked_seats
    }

    /// Booked seats over booked plus available, 0.0 for an empty map.
    pub fn occupancy_rate(&self) -> f64 {
        let counted = self.booked_seats + self.available_seats;
        if counted == 0 {
            return 0.0;
        }
        f64::from(self.booked_seats) / f64::from(counted)
    }
}

// Command methods (return events)
impl SeatMap {
    /// Generates the flight's seats.
    ///
    /// Generating an already generated map is a no-op.
    pub fn generate(
        &self,
        flight_id: FlightId,
        layout: AircraftLayout,
    ) -> Result<Vec<SeatMapEvent>, SeatError> {
        if self.is_generated() {
            return Ok(vec![]);
        }

        let total = layout.total_seats();
        if total == 0 {
            return Err(SeatError::EmptyLayout);
        }
        if total > MAX_SEATS {
            return Err(SeatError::LayoutTooLarge { max: MAX_SEATS });
        }

        Ok(vec![SeatMapEvent::seats_generated(flight_id, layout)])
    }

    /// Takes a seat for a booking.
    ///
    /// Returns no events when the seat is already taken, whether by this
    /// booking or another one; callers read [`SeatMap::holder_of`] to tell
    /// the two apart.
    pub fn reserve(
        &self,
        seat_number: &str,
        booking_id: AggregateId,
    ) -> Result<Vec<SeatMapEvent>, SeatError> {
        let seat = self.existing_seat(seat_number)?;

        if seat.status == SeatStatus::Reserved {
            return Ok(vec![]);
        }

        Ok(vec![SeatMapEvent::seat_reserved(seat_number, booking_id)])
    }

    /// Hands a seat back.
    ///
    /// Releasing an available seat is a no-op. A seat held by a different
    /// booking is left untouched and reported as an error.
    pub fn release(
        &self,
        seat_number: &str,
        booking_id: AggregateId,
    ) -> Result<Vec<SeatMapEvent>, SeatError> {
        let seat = self.existing_seat(seat_number)?;

        match seat.reserved_by {
            None => Ok(vec![]),
            Some(holder) if holder == booking_id => {
                Ok(vec![SeatMapEvent::seat_released(seat_number, booking_id)])
            }
            Some(holder) => Err(SeatError::HeldByAnotherBooking {
                seat_number: seat_number.to_string(),
                holder,
            }),
        }
    }

    fn existing_seat(&self, seat_number: &str) -> Result<&Seat, SeatError> {
        let Some(flight_id) = self.flight_id else {
            return Err(SeatError::NotGenerated);
        };

        self.seat(seat_number).ok_or_else(|| {
            tracing::debug!(%flight_id, seat_number, "Unknown seat");
            SeatError::SeatNotFound {
                seat_number: seat_number.to_string(),
            }
        })
    }
}

// Apply event helpers
impl SeatMap {
    fn apply_seats_generated(&mut self, data: SeatsGeneratedData) {
        self.id = Some(data.flight_id.seat_map_id());
        self.flight_id = Some(data.flight_id);
        self.layout = data.layout;
        self.seats = data
            .seats
            .into_iter()
            .map(|spec| Seat::available(spec.seat_number, spec.seat_class))
            .collect();
        self.index = self
            .seats
            .iter()
            .enumerate()
            .map(|(i, s)| (s.seat_number.clone(), i))
            .collect();
        self.available_seats = self.seats.len() as u32;
        self.booked_seats = 0;
    }

    fn apply_seat_reserved(&mut self, data: SeatReservedData) {
        if let Some(&i) = self.index.get(&data.seat_number) {
            let seat = &mut self.seats[i];
            if seat.status == SeatStatus::Available {
                self.available_seats -= 1;
                self.booked_seats += 1;
            }
            seat.status = SeatStatus::Reserved;
            seat.reserved_by = Some(data.booking_id);
            seat.reserved_at = Some(data.reserved_at);
        }
    }

    fn apply_seat_released(&mut self, data: SeatReleasedData) {
        if let Some(&i) = self.index.get(&data.seat_number) {
            let seat = &mut self.seats[i];
            if seat.status == SeatStatus::Reserved {
                self.available_seats += 1;
                self.booked_seats -= 1;
            }
            seat.status = SeatStatus::Available;
            seat.reserved_by = None;
            seat.reserved_at = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generated_map() -> (FlightId, SeatMap) {
        let flight_id = FlightId::new();
        let mut map = SeatMap::default();
        let events = map
            .generate(flight_id, AircraftLayout::new(4, 6, 12))
            .unwrap();
        map.apply_events(events);
        (flight_id, map)
    }

    #[test]
    fn generate_creates_available_seats() {
        let (flight_id, map) = generated_map();

        assert_eq!(map.id(), Some(flight_id.seat_map_id()));
        assert_eq!(map.total_seats(), 22);
        assert_eq!(map.available_seats(), 22);
        assert_eq!(map.booked_seats(), 0);
        assert_eq!(map.occupancy_rate(), 0.0);
        assert!(map.seats().all(|s| s.is_available()));
    }

    #[test]
    fn generate_twice_is_a_no_op() {
        let (flight_id, map) = generated_map();
        let events = map
            .generate(flight_id, AircraftLayout::new(0, 0, 3))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn generate_rejects_empty_layout() {
        let result = SeatMap::default().generate(FlightId::new(), AircraftLayout::default());
        assert!(matches!(result, Err(SeatError::EmptyLayout)));
    }

    #[test]
    fn reserve_takes_an_available_seat() {
        let (_, mut map) = generated_map();
        let booking = AggregateId::new();

        let events = map.reserve("3A", booking).unwrap();
        assert_eq!(events.len(), 1);
        map.apply_events(events);

        assert_eq!(map.holder_of("3A"), Some(booking));
        assert_eq!(map.seat("3A").unwrap().status, SeatStatus::Reserved);
        assert_eq!(map.available_seats(), 21);
        assert_eq!(map.booked_seats(), 1);
    }

    #[test]
    fn reserve_taken_seat_emits_nothing() {
        let (_, mut map) = generated_map();
        let first = AggregateId::new();
        map.apply_events(map.reserve("3A", first).unwrap());

        assert!(map.reserve("3A", AggregateId::new()).unwrap().is_empty());
        assert!(map.reserve("3A", first).unwrap().is_empty());
        assert_eq!(map.holder_of("3A"), Some(first));
    }

    #[test]
    fn unknown_seat_is_rejected() {
        let (_, map) = generated_map();
        let result = map.reserve("99Z", AggregateId::new());
        assert!(matches!(result, Err(SeatError::SeatNotFound { .. })));
    }

    #[test]
    fn reserve_before_generation_is_rejected() {
        let result = SeatMap::default().reserve("1A", AggregateId::new());
        assert!(matches!(result, Err(SeatError::NotGenerated)));
    }

    #[test]
    fn release_by_holder_frees_the_seat() {
        let (_, mut map) = generated_map();
        let booking = AggregateId::new();
        map.apply_events(map.reserve("1B", booking).unwrap());

        let events = map.release("1B", booking).unwrap();
        map.apply_events(events);

        assert!(map.seat("1B").unwrap().is_available());
        assert_eq!(map.holder_of("1B"), None);
        assert_eq!(map.available_seats(), map.total_seats());
    }

    #[test]
    fn release_of_available_seat_is_a_no_op() {
        let (_, map) = generated_map();
        assert!(map.release("1B", AggregateId::new()).unwrap().is_empty());
    }

    #[test]
    fn release_by_another_booking_is_rejected() {
        let (_, mut map) = generated_map();
        let holder = AggregateId::new();
        map.apply_events(map.reserve("1B", holder).unwrap());

        let result = map.release("1B", AggregateId::new());
        assert!(matches!(
            result,
            Err(SeatError::HeldByAnotherBooking { holder: h, .. }) if h == holder
        ));
    }

    #[test]
    fn occupancy_rate_is_a_ratio() {
        let flight_id = FlightId::new();
        let mut map = SeatMap::default();
        map.apply_events(map.generate(flight_id, AircraftLayout::new(4, 0, 0)).unwrap());
        map.apply_events(map.reserve("1A", AggregateId::new()).unwrap());

        assert_eq!(map.occupancy_rate(), 0.25);
    }

    #[test]
    fn oversized_layout_is_rejected() {
        let map = SeatMap::default();

        let overflowing = map.generate(FlightId::new(), AircraftLayout::new(u32::MAX, 1, 0));
        assert!(matches!(overflowing, Err(SeatError::LayoutTooLarge { .. })));

        let too_many = map.generate(FlightId::new(), AircraftLayout::new(0, 0, MAX_SEATS + 1));
        assert!(matches!(too_many, Err(SeatError::LayoutTooLarge { max }) if max == MAX_SEATS));

        assert!(map.generate(FlightId::new(), AircraftLayout::new(0, 0, MAX_SEATS)).is_ok());
    }
}
