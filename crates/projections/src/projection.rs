//! Projection and read model traits.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// Number of store events a projection has handled, including events from
/// aggregates it ignores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPosition {
    pub events_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn advance(&self) -> Self {
        Self {
            events_processed: self.events_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.events_processed)
    }
}

/// Folds store events into a read model.
///
/// The processor hands each event to `handle` once; `handle` advances the
/// position for every event it is given, including ones it ignores.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Clears the read model and rewinds to zero.
    async fn reset(&self) -> Result<()>;
}

/// Query-side view of denormalized rows.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of rows; 0 while a writer holds the lock.
    fn count(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_counts_handled_events() {
        let pos = ProjectionPosition::zero().advance().advance();

        assert_eq!(pos.events_processed, 2);
        assert!(pos > ProjectionPosition::zero());
        assert_eq!(pos.to_string(), "position(2)");
    }
}
