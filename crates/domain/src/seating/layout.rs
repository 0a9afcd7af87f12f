use serde::{Deserialize, Serialize};

use super::SeatClass;

const NARROW_CABIN: [char; 4] = ['A', 'B', 'C', 'D'];
const WIDE_CABIN: [char; 6] = ['A', 'B', 'C', 'D', 'E', 'F'];

/// Largest seat count a single aircraft layout may produce.
pub const MAX_SEATS: u32 = 1_000;

/// Seat counts per cabin class for one aircraft.
///
/// Seats are numbered row-major. First class fills rows of four (A-D)
/// starting at row 1; business and economy fill rows of six (A-F), each
/// starting on the row after the previous cabin ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AircraftLayout {
    pub first_class: u32,
    pub business: u32,
    pub economy: u32,
}

/// A seat number and its class, as produced by [`AircraftLayout::generate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatSpec {
    pub seat_number: String,
    pub seat_class: SeatClass,
}

impl AircraftLayout {
    pub fn new(first_class: u32, business: u32, economy: u32) -> Self {
        Self {
            first_class,
            business,
            economy,
        }
    }

    /// Total seat count, saturating at `u32::MAX`.
    pub fn total_seats(&self) -> u32 {
        self.first_class
            .saturating_add(self.business)
            .saturating_add(self.economy)
    }

    /// Expands the layout into concrete seat numbers.
    pub fn generate(&self) -> Vec<SeatSpec> {
        let mut seats = Vec::with_capacity(self.total_seats() as usize);

        let business_start = self.first_class.div_ceil(4) + 1;
        let economy_start = business_start + self.business.div_ceil(6);

        fill_cabin(
            &mut seats,
            SeatClass::FirstClass,
            &NARROW_CABIN,
            1,
            self.first_class,
        );
        fill_cabin(
            &mut seats,
            SeatClass::Business,
            &WIDE_CABIN,
            business_start,
            self.business,
        );
        fill_cabin(
            &mut seats,
            SeatClass::Economy,
            &WIDE_CABIN,
            economy_start,
            self.economy,
        );

        seats
    }
}

fn fill_cabin(
    seats: &mut Vec<SeatSpec>,
    seat_class: SeatClass,
    columns: &[char],
    first_row: u32,
    count: u32,
) {
    let mut row = first_row;
    let mut placed = 0;
    while placed < count {
        for column in columns {
            if placed == count {
                break;
            }
            seats.push(SeatSpec {
                seat_number: format!("{row}{column}"),
                seat_class,
            });
            placed += 1;
        }
        row += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(seats: &[SeatSpec], class: SeatClass) -> Vec<&str> {
        seats
            .iter()
            .filter(|s| s.seat_class == class)
            .map(|s| s.seat_number.as_str())
            .collect()
    }

    #[test]
    fn cabins_start_on_their_own_rows() {
        let seats = AircraftLayout::new(6, 8, 3).generate();

        assert_eq!(
            numbers(&seats, SeatClass::FirstClass),
            vec!["1A", "1B", "1C", "1D", "2A", "2B"]
        );
        assert_eq!(
            numbers(&seats, SeatClass::Business),
            vec!["3A", "3B", "3C", "3D", "3E", "3F", "4A", "4B"]
        );
        assert_eq!(numbers(&seats, SeatClass::Economy), vec!["5A", "5B", "5C"]);
    }

    #[test]
    fn economy_only_starts_at_row_one() {
        let seats = AircraftLayout::new(0, 0, 7).generate();
        assert_eq!(seats.len(), 7);
        assert_eq!(seats[0].seat_number, "1A");
        assert_eq!(seats[6].seat_number, "2A");
    }

    #[test]
    fn generated_numbers_are_unique() {
        let layout = AircraftLayout::new(8, 24, 150);
        let seats = layout.generate();
        let unique: std::collections::HashSet<_> =
            seats.iter().map(|s| s.seat_number.clone()).collect();

        assert_eq!(seats.len() as u32, layout.total_seats());
        assert_eq!(unique.len(), seats.len());
    }
}
