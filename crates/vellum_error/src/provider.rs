//! Provider error types and retry classification.

/// Failure modes of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// Call did not complete within the configured timeout
    Timeout {
        /// Elapsed budget in milliseconds
        after_ms: u64,
    },
    /// Provider answered with a non-success status
    Rejected {
        /// HTTP status code
        status: u16,
        /// Error body or reason phrase
        message: String,
    },
    /// Credentials were refused
    Unauthorized(String),
    /// Request was malformed or referenced an unknown model
    InvalidRequest(String),
    /// Transport failed before a response arrived
    Network(String),
    /// Response could not be decoded or carried no text
    MalformedResponse(String),
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderErrorKind::Timeout { after_ms } => {
                write!(f, "Provider call timed out after {}ms", after_ms)
            }
            ProviderErrorKind::Rejected { status, message } => {
                write!(f, "Provider returned HTTP {}: {}", status, message)
            }
            ProviderErrorKind::Unauthorized(msg) => write!(f, "Provider refused credentials: {}", msg),
            ProviderErrorKind::InvalidRequest(msg) => write!(f, "Invalid provider request: {}", msg),
            ProviderErrorKind::Network(msg) => write!(f, "Network error: {}", msg),
            ProviderErrorKind::MalformedResponse(msg) => {
                write!(f, "Malformed provider response: {}", msg)
            }
        }
    }
}

impl ProviderErrorKind {
    /// Check if this error type should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderErrorKind::Timeout { .. } => true,
            ProviderErrorKind::Network(_) => true,
            ProviderErrorKind::Rejected { status, .. } => {
                matches!(*status, 408 | 429 | 500..=599)
            }
            _ => false,
        }
    }
}

/// Provider error with source location tracking.
///
/// # Examples
///
/// ```
/// use vellum_error::{ProviderError, ProviderErrorKind, RetryableError};
///
/// let err = ProviderError::new(ProviderErrorKind::Rejected {
///     status: 503,
///     message: "Service unavailable".to_string(),
/// });
/// assert!(err.is_retryable());
/// assert!(format!("{}", err).contains("HTTP 503"));
/// ```
#[derive(Debug, Clone)]
pub struct ProviderError {
    /// The kind of error that occurred
    pub kind: ProviderErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ProviderError {
    /// Create a new ProviderError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ProviderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Short description suitable for storing on a failed version.
    pub fn summary(&self) -> String {
        self.kind.to_string()
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Provider Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for ProviderError {}

/// Errors that know whether another attempt could succeed.
///
/// Transient failures such as 503, 429 or a timeout return true. Permanent
/// failures such as 401 or 400 return false and end the retry loop at once.
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for ProviderError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
