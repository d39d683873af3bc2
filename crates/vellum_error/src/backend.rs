//! Internal failure error type.

/// Internal failure with source location.
///
/// Used for conditions that are neither caller mistakes nor provider
/// failures, such as a generation task that could not be joined.
#[derive(Debug, Clone)]
pub struct BackendError {
    /// Error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl BackendError {
    /// Create a new BackendError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum_error::BackendError;
    ///
    /// let err = BackendError::new("Generation task panicked");
    /// assert!(err.message.contains("panicked"));
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

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Backend Error: {} at line {} in {}",
            self.message, self.line, self.file
        )
    }
}

impl std::error::Error for BackendError {}
