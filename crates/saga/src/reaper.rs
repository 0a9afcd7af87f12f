//! Periodic expiry of abandoned pending bookings.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use event_store::EventStore;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::coordinator::BookingCoordinator;
use crate::error::{Result, SagaError};

/// Default sweep period.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    /// Bookings that could not be expired this pass; the next pass retries.
    pub failed: usize,
}

/// Expires pending bookings whose hold window has ended.
pub struct ExpirationReaper<S: EventStore + Clone> {
    coordinator: Arc<BookingCoordinator<S>>,
}

impl<S: EventStore + Clone> ExpirationReaper<S> {
    pub fn new(coordinator: Arc<BookingCoordinator<S>>) -> Self {
        Self { coordinator }
    }

    pub async fn run_once(&self) -> Result<SweepReport> {
        self.run_once_at(Utc::now()).await
    }

    /// Expires every pending booking whose deadline is before `now`.
    ///
    /// A booking that was confirmed or cancelled after the scan is skipped.
    #[tracing::instrument(skip(self))]
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        metrics::counter!("reaper_sweeps_total").increment(1);
        let overdue = self.coordinator.overdue_bookings(now).await?;
        let mut report = SweepReport::default();

        for summary in overdue {
            match self.coordinator.expire_booking(summary.booking_id, now).await {
                Ok(_) => report.expired += 1,
                Err(SagaError::InvalidState(reason)) => {
                    tracing::debug!(booking_id = %summary.booking_id, %reason, "Booking settled before expiry");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(booking_id = %summary.booking_id, error = %e, "Failed to expire booking");
                }
            }
        }

        if report.expired > 0 || report.failed > 0 {
            tracing::info!(expired = report.expired, failed = report.failed, "Expiration sweep finished");
        }
        Ok(report)
    }

    /// Sweeps every `interval` until `shutdown` flips to true.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(interval_secs = interval.as_secs(), "Expiration reaper started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Expiration sweep failed");
                    }
                }
            }
        }

        tracing::info!("Expiration reaper stopped");
    }
}
