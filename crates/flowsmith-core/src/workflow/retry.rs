//! Retry of transient collaborator failures.
//!
//! Only `InvokeError::Transient` is retried. Attempt `n` (1-based) that fails
//! transiently waits `n * backoff` before the next attempt, until the node's
//! retry budget is spent. The node timeout bounds all attempts together.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::invoker::InvokeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Linear backoff step.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Whether to try again after failed attempt number `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32, error: &InvokeError) -> bool {
        error.is_transient() && attempt <= self.max_retries
    }

    /// Delay before the attempt following `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }

    /// Run `op` until it succeeds, fails fatally, or runs out of retries.
    ///
    /// `attempts` is bumped before each attempt so that callers can still
    /// report the count if the whole future is dropped on timeout.
    pub async fn run<T, F, Fut>(&self, attempts: &AtomicU32, mut op: F) -> Result<T, InvokeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, InvokeError>>,
    {
        loop {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(attempt, &err) => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
