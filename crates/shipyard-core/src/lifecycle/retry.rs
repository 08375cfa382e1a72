//! Bounded retry for transient storage failures.
//!
//! Only `RepositoryError::Storage` is retried. Not-found, duplicate,
//! corrupt records, and version conflicts are answers, not outages, and are
//! returned at once.

use std::future::Future;
use std::time::Duration;

use shipyard_types::config::LifecycleConfig;
use shipyard_types::error::RepositoryError;

/// Exponential-backoff retry policy for repository calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageRetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for StorageRetryPolicy {
    fn default() -> Self {
        Self::from_config(&LifecycleConfig::default())
    }
}

impl StorageRetryPolicy {
    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self {
            max_attempts: config.storage_max_attempts,
            base_backoff: config.storage_backoff(),
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
        }
    }

    /// Whether a failed call should be attempted again.
    ///
    /// `attempt` is 1-based (first execution is attempt 1).
    pub fn should_retry(&self, attempt: u32, error: &RepositoryError) -> bool {
        error.is_transient() && attempt < self.max_attempts.max(1)
    }

    /// Delay before the attempt following `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1 << exponent)
    }

    /// Run `call` until it succeeds, fails permanently, or the attempt
    /// budget is spent. The last error is returned.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, RepositoryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(attempt, &e) => {
                    let delay = self.backoff(attempt);
                    tracing::debug!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient storage failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
