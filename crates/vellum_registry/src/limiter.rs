//! Per-model admission control using governor and Tokio Semaphore.
//!
//! - Requests per minute are enforced with a GCRA limiter from `governor`
//! - Concurrent in-flight calls are enforced with a Tokio Semaphore

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument};
use vellum_core::ModelLimits;
use vellum_error::BackendError;

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Admission limiter for one model.
///
/// # Example
///
/// ```
/// use vellum_core::ModelLimits;
/// use vellum_registry::ModelLimiter;
///
/// # tokio_test_block(async {
/// let limiter = ModelLimiter::new(&ModelLimits::new(None, Some(1)));
/// let guard = limiter.acquire().await.unwrap();
/// assert!(limiter.try_acquire().is_none());
/// drop(guard);
/// assert!(limiter.try_acquire().is_some());
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ModelLimiter {
    rpm_limiter: Option<Arc<DirectRateLimiter>>,
    concurrent_semaphore: Option<Arc<Semaphore>>,
}

/// Held while a unit is admitted. Dropping it releases the concurrency slot.
#[derive(Debug)]
pub struct AdmissionGuard {
    _permit: Option<OwnedSemaphorePermit>,
}

impl ModelLimiter {
    /// Create a limiter enforcing every non-None limit.
    pub fn new(limits: &ModelLimits) -> Self {
        let rpm_limiter = limits
            .requests_per_minute()
            .and_then(NonZeroU32::new)
            .map(|n| Arc::new(GovernorRateLimiter::direct(Quota::per_minute(n))));

        let concurrent_semaphore = limits
            .max_concurrent()
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));

        Self {
            rpm_limiter,
            concurrent_semaphore,
        }
    }

    /// Wait until every limit admits one more call.
    ///
    /// The quota is taken first so a waiting unit never holds a concurrency slot.
    #[instrument(skip(self))]
    pub async fn acquire(&self) -> Result<AdmissionGuard, BackendError> {
        if let Some(limiter) = &self.rpm_limiter {
            limiter.until_ready().await;
        }

        let permit = match &self.concurrent_semaphore {
            Some(semaphore) => Some(
                semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| BackendError::new(format!("Admission semaphore closed: {}", e)))?,
            ),
            None => None,
        };

        debug!(
            available = self.concurrent_semaphore.as_ref().map(|s| s.available_permits()),
            "Admitted"
        );
        Ok(AdmissionGuard { _permit: permit })
    }

    /// Try to admit without waiting.
    pub fn try_acquire(&self) -> Option<AdmissionGuard> {
        if let Some(semaphore) = &self.concurrent_semaphore
            && semaphore.available_permits() == 0
        {
            return None;
        }
        if let Some(limiter) = &self.rpm_limiter {
            limiter.check().ok()?;
        }
        let permit = match &self.concurrent_semaphore {
            Some(semaphore) => Some(semaphore.clone().try_acquire_owned().ok()?),
            None => None,
        };
        Some(AdmissionGuard { _permit: permit })
    }
}
