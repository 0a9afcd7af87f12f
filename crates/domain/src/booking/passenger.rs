use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::BookingError;

/// Travel document presented by a passenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Passport,
    Id,
}

/// A traveller on a booking and the seat they sit in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    pub first_name: String,
    pub last_name: String,
    pub document_type: DocumentType,
    pub document_number: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    pub seat_number: String,
}

impl Passenger {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        document_type: DocumentType,
        document_number: impl Into<String>,
        seat_number: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            document_type,
            document_number: document_number.into(),
            date_of_birth: None,
            seat_number: seat_number.into(),
        }
    }

    pub fn with_date_of_birth(mut self, date_of_birth: NaiveDate) -> Self {
        self.date_of_birth = Some(date_of_birth);
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Checks that every required field is filled in.
    pub fn validate(&self) -> Result<(), BookingError> {
        let required = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("document_number", &self.document_number),
            ("seat_number", &self.seat_number),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(BookingError::MissingPassengerField { field });
            }
        }

        Ok(())
    }
}
