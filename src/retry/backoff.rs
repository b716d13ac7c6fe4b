//! `backoff` crate based retries.
//!
//! The `backoff` crate bounds retries by elapsed time only; the executor adds an
//! attempt budget on top so that the configured `max_retries` stays authoritative.

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::error::LlmError;

/// Backoff-based retry executor
#[derive(Debug, Clone)]
pub struct BackoffRetryExecutor {
    backoff: ExponentialBackoff,
    max_attempts: u32,
}

impl Default for BackoffRetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffRetryExecutor {
    pub fn new() -> Self {
        Self::with_backoff(compressa_backoff())
    }

    pub fn with_backoff(backoff: ExponentialBackoff) -> Self {
        Self {
            backoff,
            max_attempts: 3,
        }
    }

    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, LlmError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, LlmError>>,
    {
        let attempts = Arc::new(AtomicU32::new(0));
        let max_attempts = self.max_attempts.max(1);

        backoff::future::retry(self.backoff.clone(), || {
            let attempts = attempts.clone();
            let fut = operation();
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                fut.await.map_err(|e| {
                    if e.is_retryable() && attempt < max_attempts {
                        tracing::debug!(
                            attempt,
                            max_attempts,
                            error = %e,
                            "transient error, backing off"
                        );
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
    }
}

/// Default backoff used for the Compressa endpoints.
pub fn compressa_backoff() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(500))
        .with_max_interval(Duration::from_secs(20))
        .with_multiplier(2.0)
        .with_max_elapsed_time(Some(Duration::from_secs(120)))
        .build()
}
