//! Reference claims: one short stream per booking reference.
//!
//! A claim stream is created with an expected version of zero, so the store
//! lets exactly one booking own a given reference. The claim also serves as
//! the reference-to-booking index.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, DomainEvent};

use super::{BookingError, BookingReference};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ReferenceClaimEvent {
    ReferenceClaimed(ReferenceClaimedData),
}

impl DomainEvent for ReferenceClaimEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReferenceClaimEvent::ReferenceClaimed(_) => "ReferenceClaimed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceClaimedData {
    pub reference: BookingReference,
    pub booking_id: AggregateId,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceClaim {
    id: Option<AggregateId>,
    version: Version,
    booking_id: Option<AggregateId>,
}

impl Aggregate for ReferenceClaim {
    type Event = ReferenceClaimEvent;
    type Error = BookingError;

    fn aggregate_type() -> &'static str {
        "BookingReference"
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
            ReferenceClaimEvent::ReferenceClaimed(data) => {
                self.id = Some(data.reference.claim_id());
                self.booking_id = Some(data.booking_id);
            }
        }
    }
}

impl ReferenceClaim {
    pub fn booking_id(&self) -> Option<AggregateId> {
        self.booking_id
    }

    pub fn claim(
        &self,
        reference: &BookingReference,
        booking_id: AggregateId,
    ) -> Result<Vec<ReferenceClaimEvent>, BookingError> {
        if self.id.is_some() {
            return Err(BookingError::ReferenceTaken {
                reference: reference.to_string(),
            });
        }

        Ok(vec![ReferenceClaimEvent::ReferenceClaimed(
            ReferenceClaimedData {
                reference: reference.clone(),
                booking_id,
                claimed_at: Utc::now(),
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_rejected() {
        let reference = BookingReference::generate();
        let owner = AggregateId::new();
        let mut claim = ReferenceClaim::default();
        claim.apply_events(claim.claim(&reference, owner).unwrap());

        assert_eq!(claim.id(), Some(reference.claim_id()));
        assert_eq!(claim.booking_id(), Some(owner));
        assert!(matches!(
            claim.claim(&reference, AggregateId::new()),
            Err(BookingError::ReferenceTaken { .. })
        ));
    }
}
