//! Configuration error types.
//!
//! Raised when a model selection or the engine settings cannot be resolved.
//! These errors always surface before any version row is created.

/// Configuration error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ConfigurationErrorKind {
    /// No model was selected for a generation batch
    #[display("At least one model must be selected")]
    EmptyModelSelection,
    /// More models were selected than a single batch allows
    #[display("Selected {requested} models, at most {max} are allowed per batch")]
    TooManyModels {
        /// Number of models requested
        requested: usize,
        /// Configured maximum
        max: usize,
    },
    /// Model ID is not registered
    #[display("Model {_0} is not configured")]
    UnknownModel(i64),
    /// Model ID is registered but disabled
    #[display("Model {_0} is disabled")]
    DisabledModel(i64),
    /// Model ID is already registered
    #[display("Model {_0} is already registered")]
    DuplicateModel(i64),
    /// No enabled model can act as the default
    #[display("No enabled model is available as default")]
    NoDefaultModel,
    /// Provider credentials are missing
    #[display("Model {model} has no API key (checked {source_hint})")]
    MissingCredentials {
        /// Model ID
        model: i64,
        /// Where the key was looked up
        source_hint: String,
    },
    /// Settings file or environment could not be loaded
    #[display("Invalid settings: {_0}")]
    Settings(String),
}

/// Configuration error with source location.
///
/// # Examples
///
/// ```
/// use vellum_error::{ConfigurationError, ConfigurationErrorKind};
///
/// let err = ConfigurationError::new(ConfigurationErrorKind::DisabledModel(7));
/// assert!(format!("{}", err).contains("Model 7 is disabled"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", kind, line, file)]
pub struct ConfigurationError {
    /// The kind of error that occurred
    pub kind: ConfigurationErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ConfigurationError {
    /// Create a new ConfigurationError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ConfigurationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
