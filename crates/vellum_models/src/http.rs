//! Mapping of HTTP outcomes onto provider error kinds.

use std::time::Duration;
use vellum_error::{ProviderError, ProviderErrorKind};

/// Classify a non-success HTTP status.
///
/// # Examples
///
/// ```
/// use vellum_error::{ProviderErrorKind, RetryableError};
/// use vellum_models::classify_status;
///
/// let err = classify_status(401, "bad key".to_string());
/// assert!(matches!(err.kind, ProviderErrorKind::Unauthorized(_)));
/// assert!(!err.is_retryable());
/// assert!(classify_status(503, String::new()).is_retryable());
/// ```
#[track_caller]
pub fn classify_status(status: u16, body: String) -> ProviderError {
    let kind = match status {
        401 | 403 => ProviderErrorKind::Unauthorized(body),
        400 | 404 | 422 => ProviderErrorKind::InvalidRequest(format!("HTTP {}: {}", status, body)),
        _ => ProviderErrorKind::Rejected {
            status,
            message: body,
        },
    };
    ProviderError::new(kind)
}

/// Classify a transport failure from reqwest.
#[track_caller]
pub fn classify_transport(err: &reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::new(ProviderErrorKind::Timeout {
            after_ms: timeout.as_millis() as u64,
        })
    } else if err.is_decode() {
        ProviderError::new(ProviderErrorKind::MalformedResponse(err.to_string()))
    } else {
        ProviderError::new(ProviderErrorKind::Network(err.to_string()))
    }
}
