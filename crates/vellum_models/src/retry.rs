//! Retry with exponential backoff for provider calls.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};
use vellum_core::{GenerationOutput, GenerationParams};
use vellum_error::{ProviderError, ProviderErrorKind, RetryableError};
use vellum_interface::ProviderAdapter;

/// Retry configuration for provider calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound of any single delay.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Same backoff curve with a different retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay slept before retry number `retry` (1-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use vellum_models::RetryPolicy;
    ///
    /// let policy = RetryPolicy {
    ///     max_retries: 5,
    ///     initial_backoff: Duration::from_millis(100),
    ///     max_backoff: Duration::from_millis(300),
    ///     backoff_multiplier: 2.0,
    /// };
    /// assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
    /// assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
    /// assert_eq!(policy.backoff_for(3), Duration::from_millis(300));
    /// ```
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let mut backoff = self.initial_backoff;
        for _ in 1..retry {
            backoff = std::cmp::min(
                Duration::from_secs_f64(backoff.as_secs_f64() * self.backoff_multiplier),
                self.max_backoff,
            );
        }
        std::cmp::min(backoff, self.max_backoff)
    }
}

/// Retries an operation with exponential backoff.
///
/// Errors that are not retryable end the loop immediately.
#[instrument(skip(operation), fields(max_retries = policy.max_retries))]
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let max_attempts = policy.max_retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!(attempt, "Executing operation");

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_retryable() {
                    warn!(attempt, error = %err, "Error is not retryable, failing immediately");
                    return Err(err);
                }

                if attempt >= max_attempts {
                    warn!(attempt, error = %err, "All retry attempts exhausted");
                    return Err(err);
                }

                let backoff = policy.backoff_for(attempt);
                debug!(backoff_ms = backoff.as_millis() as u64, error = %err, "Retrying after failure");
                sleep(backoff).await;
            }
        }
    }
}

/// Calls an adapter through the retry policy, bounding every attempt by the
/// model's timeout.
#[instrument(skip_all, fields(model = adapter.model_name()))]
pub async fn generate_with_retry(
    adapter: &dyn ProviderAdapter,
    prompt: &str,
    params: &GenerationParams,
    policy: &RetryPolicy,
) -> Result<GenerationOutput, ProviderError> {
    let timeout = params.timeout();
    retry_with_backoff(policy, move || async move {
        match tokio::time::timeout(timeout, adapter.generate(prompt, params, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::new(ProviderErrorKind::Timeout {
                after_ms: timeout.as_millis() as u64,
            })),
        }
    })
    .await
}
