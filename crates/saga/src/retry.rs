//! Bounded retry with exponential backoff for collaborator calls.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// How a collaborator call is retried.
///
/// Only transient errors (see [`SagaError::is_transient`]) are retried; any
/// other error is returned on the first attempt.
///
/// [`SagaError::is_transient`]: crate::SagaError::is_transient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// One attempt, no retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Short, fast retries for seat reservation and release.
    pub fn seat_inventory() -> Self {
        Self::new(3, Duration::from_millis(20), Duration::from_millis(200))
    }

    /// Few, slower retries for the payment provider.
    pub fn payment_provider() -> Self {
        Self::new(2, Duration::from_millis(250), Duration::from_secs(2))
    }

    /// Backoff before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `call` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let backoff = self.backoff(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    metrics::counter!("retry_attempts_total", "operation" => operation)
                        .increment(1);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
