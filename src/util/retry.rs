//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use crate::config::BatonConfig;
use crate::error::BatonError;

/// Retry policy for provider calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy from the configured retry count and initial backoff. A retry
    /// count of zero still makes one attempt.
    pub fn from_config(config: &BatonConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            initial_backoff: config.retry_initial_backoff(),
            ..Self::default()
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Execute an async operation, retrying errors that
    /// [`BatonError::is_retryable`] accepts.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, BatonError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BatonError>>,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !error.is_retryable() || attempt >= self.max_attempts {
                return Err(error);
            }

            let sleep_for = match &error {
                BatonError::RateLimited {
                    retry_after_ms: Some(ms),
                } => Duration::from_millis(*ms).min(self.max_backoff),
                _ => {
                    // 75%-125% of the current backoff
                    let jitter = 0.75 + rand_factor() * 0.5;
                    Duration::from_secs_f64(backoff.as_secs_f64() * jitter)
                }
            };

            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = sleep_for.as_millis() as u64,
                error = %error,
                "retrying provider call"
            );
            tokio::time::sleep(sleep_for).await;

            backoff = Duration::from_secs_f64(
                (backoff.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
            );
        }
    }
}

/// Pseudo-random factor in [0, 1) without pulling in a rand crate.
fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    (hasher.finish() % 10_000) as f64 / 10_000.0
}
