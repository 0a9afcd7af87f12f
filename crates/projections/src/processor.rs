//! Feeds store events to registered projections.

use std::collections::BTreeSet;
use std::time::Duration;

use event_store::EventStore;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::Result;
use crate::projection::Projection;

/// How long a hole in the store sequence is waited on before it is treated
/// as a rolled-back append.
pub const DEFAULT_GAP_HORIZON: Duration = Duration::from_secs(10);

/// What one projection has consumed from the global log.
#[derive(Debug, Default)]
struct Cursor {
    /// Every sequence at or below this has been handled or given up on.
    checkpoint: u64,
    /// Handled sequences above a hole in the log.
    ahead: BTreeSet<u64>,
    /// When the hole just above `checkpoint` was first seen.
    stalled_since: Option<Instant>,
}

impl Cursor {
    fn has_handled(&self, sequence: u64) -> bool {
        sequence <= self.checkpoint || self.ahead.contains(&sequence)
    }

    fn record(&mut self, sequence: u64) {
        if sequence == self.checkpoint + 1 {
            self.checkpoint = sequence;
            self.stalled_since = None;
            self.absorb();
        } else {
            self.ahead.insert(sequence);
        }
    }

    fn absorb(&mut self) {
        while self.ahead.remove(&(self.checkpoint + 1)) {
            self.checkpoint += 1;
        }
    }

    /// Moves past a hole that has stayed open longer than `horizon`.
    fn settle(&mut self, projection: &'static str, now: Instant, horizon: Duration) {
        while let Some(&next) = self.ahead.first() {
            let since = *self.stalled_since.get_or_insert(now);
            if now.duration_since(since) < horizon {
                return;
            }
            tracing::warn!(
                projection,
                from = self.checkpoint + 1,
                to = next - 1,
                "Skipping sequence gap"
            );
            self.checkpoint = next - 1;
            self.stalled_since = None;
            self.absorb();
        }
        self.stalled_since = None;
    }
}

/// Brings projections up to date with the event store.
///
/// Each projection has its own cursor over store sequences, so catch-up reads
/// only events past the oldest cursor. An event that becomes visible after a
/// later one was read is still handled on a following catch-up; a hole that
/// stays open past the gap horizon is skipped. Concurrent catch-ups are
/// serialized so an event is never applied twice.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    cursors: Mutex<Vec<Cursor>>,
    gap_horizon: Duration,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            cursors: Mutex::new(Vec::new()),
            gap_horizon: DEFAULT_GAP_HORIZON,
        }
    }

    pub fn with_gap_horizon(mut self, horizon: Duration) -> Self {
        self.gap_horizon = horizon;
        self
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
        self.cursors.get_mut().push(Cursor::default());
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Applies every event the projections have not seen yet.
    ///
    /// Returns the number of events applied across all projections.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut cursors = self.cursors.lock().await;
        let Some(from) = cursors.iter().map(|c| c.checkpoint).min() else {
            return Ok(0);
        };

        let mut stream = self.store.stream_events_after(from).await?;
        let mut applied: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;

            for (projection, cursor) in self.projections.iter().zip(cursors.iter_mut()) {
                if cursor.has_handled(event.sequence) {
                    continue;
                }
                projection.handle(&event).await?;
                cursor.record(event.sequence);
                applied += 1;
                metrics::counter!("projections_events_processed", "projection" => projection.name())
                    .increment(1);
            }
        }

        let now = Instant::now();
        for (projection, cursor) in self.projections.iter().zip(cursors.iter_mut()) {
            cursor.settle(projection.name(), now, self.gap_horizon);
        }

        if applied > 0 {
            tracing::debug!(from, applied, "catch-up complete");
        }
        Ok(applied)
    }

    /// Resets all projections and replays the whole store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        {
            let mut cursors = self.cursors.lock().await;
            for (projection, cursor) in self.projections.iter().zip(cursors.iter_mut()) {
                projection.reset().await?;
                *cursor = Cursor::default();
            }
        }
        tracing::info!(projections = self.projections.len(), "rebuilding projections");
        self.run_catch_up().await
    }
}
