use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct MemoryLog {
    /// Every event in append order.
    events: Vec<EventEnvelope>,
    /// Current version per stream.
    heads: HashMap<AggregateId, Version>,
}

/// In-memory event store.
///
/// Used by tests and by the server when no database is configured. Appends
/// are serialized by a single write lock, which gives the same per-stream
/// version guarantees as the PostgreSQL unique constraint.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<MemoryLog>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }

    /// Returns the number of stored events of the given type.
    pub async fn count_events_of_type(&self, event_type: &str) -> usize {
        self.log
            .read()
            .await
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let first_new_version = events[0].version;

        let mut log = self.log.write().await;
        let current_version = log
            .heads
            .get(&aggregate_id)
            .copied()
            .unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            metrics::counter!("event_store_conflicts_total", "backend" => "memory").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        // Mirrors the (aggregate_id, version) unique constraint
        if first_new_version <= current_version {
            metrics::counter!("event_store_conflicts_total", "backend" => "memory").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current_version),
                actual: current_version,
            });
        }

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(current_version);
        let count = events.len();
        let first_sequence = log.events.len() as u64 + 1;
        log.events
            .extend(events.into_iter().zip(first_sequence..).map(|(mut event, sequence)| {
                event.sequence = sequence;
                event
            }));
        log.heads.insert(aggregate_id, last_version);

        metrics::counter!("event_store_events_appended_total", "backend" => "memory")
            .increment(count as u64);
        tracing::trace!(%aggregate_id, %last_version, count, "Appended events");

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        let mut events: Vec<_> = log
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn stream_events_after(&self, after: u64) -> Result<EventStream> {
        use futures_util::stream;

        let log = self.log.read().await;
        let start = log.events.partition_point(|e| e.sequence <= after);
        let events = log.events[start..].to_vec();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.log.read().await.heads.get(&aggregate_id).copied())
    }
}
