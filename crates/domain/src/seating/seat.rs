use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

/// Cabin class of a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatClass {
    FirstClass,
    Business,
    Economy,
}

impl SeatClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatClass::FirstClass => "FIRST_CLASS",
            SeatClass::Business => "BUSINESS",
            SeatClass::Economy => "ECONOMY",
        }
    }
}

impl std::fmt::Display for SeatClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a seat can be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    #[default]
    Available,
    Reserved,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Reserved => "RESERVED",
        }
    }
}

impl std::fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One seat on a flight.
///
/// `reserved_by` is set exactly when the status is `Reserved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub seat_number: String,
    pub seat_class: SeatClass,
    pub status: SeatStatus,
    pub reserved_by: Option<AggregateId>,
    pub reserved_at: Option<DateTime<Utc>>,
}

impl Seat {
    /// Creates an available seat.
    pub fn available(seat_number: impl Into<String>, seat_class: SeatClass) -> Self {
        Self {
            seat_number: seat_number.into(),
            seat_class,
            status: SeatStatus::Available,
            reserved_by: None,
            reserved_at: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        assert_eq!(
            serde_json::to_string(&SeatClass::FirstClass).unwrap(),
            "\"FIRST_CLASS\""
        );
        assert_eq!(
            serde_json::to_string(&SeatStatus::Reserved).unwrap(),
            "\"RESERVED\""
        );
        assert_eq!(SeatClass::Economy.to_string(), "ECONOMY");
    }

    #[test]
    fn new_seat_is_available() {
        let seat = Seat::available("12A", SeatClass::Economy);
        assert!(seat.is_available());
        assert!(seat.reserved_by.is_none());
    }
}
