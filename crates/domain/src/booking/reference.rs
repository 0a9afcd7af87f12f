use common::AggregateId;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::BookingError;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const LENGTH: usize = 6;

/// Six-character customer-facing booking code, e.g. `K7Q2ZD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingReference(String);

impl BookingReference {
    /// Draws a random reference.
    ///
    /// Uniqueness is not guaranteed here; it is enforced when the reference
    /// is claimed (see [`BookingReference::claim_id`]).
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..LENGTH)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Parses a reference supplied by a caller.
    pub fn parse(value: &str) -> Result<Self, BookingError> {
        let value = value.trim().to_ascii_uppercase();
        if value.len() == LENGTH && value.bytes().all(|b| ALPHABET.contains(&b)) {
            Ok(Self(value))
        } else {
            Err(BookingError::InvalidReference { reference: value })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Stream id that at most one booking can create for this reference.
    pub fn claim_id(&self) -> AggregateId {
        AggregateId::derived("BookingReference", &self.0)
    }
}

impl std::fmt::Display for BookingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
