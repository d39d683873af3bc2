//! Not found error types.

/// Entities that can be missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum NotFoundErrorKind {
    /// Proposal does not exist
    #[display("Proposal {_0} not found")]
    Proposal(i64),
    /// Version does not exist
    #[display("Version {_0} not found")]
    Version(i64),
    /// Model configuration does not exist
    #[display("Model {_0} not found")]
    Model(i64),
    /// Batch does not exist
    #[display("Batch {_0} not found")]
    Batch(String),
}

/// Not found error with source location.
///
/// # Examples
///
/// ```
/// use vellum_error::{NotFoundError, NotFoundErrorKind};
///
/// let err = NotFoundError::new(NotFoundErrorKind::Version(42));
/// assert!(format!("{}", err).contains("Version 42 not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Not Found: {} at line {} in {}", kind, line, file)]
pub struct NotFoundError {
    /// The missing entity
    pub kind: NotFoundErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl NotFoundError {
    /// Create a new NotFoundError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: NotFoundErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
