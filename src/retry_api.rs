//! Public Retry API Facade
//!
//! One entry point for transport-level retries. Both backends are bounded by an
//! attempt count so that the `max_retries` configuration value stays authoritative.
//!
//! ```rust,no_run
//! use siumai_provider_compressa::retry_api::{retry_with, RetryOptions};
//!
//! # async fn do_work() -> Result<String, siumai_provider_compressa::LlmError> { Ok("ok".into()) }
//! # async fn example() -> Result<(), siumai_provider_compressa::LlmError> {
//! let options = RetryOptions::from_max_retries(2);
//! let result = retry_with(|| do_work(), &options).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::LlmError;

pub use crate::retry::{BackoffRetryExecutor, RetryExecutor, RetryPolicy};

/// Retry backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryBackend {
    /// Simple policy-based executor (`retry/policy.rs`)
    #[default]
    Policy,
    /// Backoff crate-based executor (`retry/backoff.rs`)
    Backoff,
}

/// Unified retry options
#[derive(Debug, Clone)]
pub struct RetryOptions {
    pub backend: RetryBackend,
    pub policy: RetryPolicy,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            backend: RetryBackend::Policy,
            policy: RetryPolicy::default(),
        }
    }
}

impl RetryOptions {
    /// Policy backend allowing `max_retries` retries after the first attempt.
    pub fn from_max_retries(max_retries: u32) -> Self {
        Self {
            backend: RetryBackend::Policy,
            policy: RetryPolicy::from_max_retries(max_retries),
        }
    }

    /// Switch to the backoff crate backend, keeping the attempt budget.
    pub fn backoff(mut self) -> Self {
        self.backend = RetryBackend::Backoff;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }
}

/// Retry with explicit options (backend selection)
pub async fn retry_with<F, Fut, T>(operation: F, options: &RetryOptions) -> Result<T, LlmError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, LlmError>>,
{
    match options.backend {
        RetryBackend::Policy => {
            RetryExecutor::new(options.policy.clone())
                .execute(operation)
                .await
        }
        RetryBackend::Backoff => {
            BackoffRetryExecutor::new()
                .with_max_attempts(options.policy.max_attempts)
                .execute(operation)
                .await
        }
    }
}
