//! Input validation error type.

/// Caller input rejected before any work started.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Validation Error: {} at line {} in {}", message, line, file)]
pub struct ValidationError {
    /// Description of the rejected input
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ValidationError {
    /// Create a new ValidationError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum_error::ValidationError;
    ///
    /// let err = ValidationError::new("rating must be between 1 and 5");
    /// assert!(format!("{}", err).contains("between 1 and 5"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
