//! Error types for the Vellum proposal generation engine.
//!
//! Every error carries the source location where it was constructed. Domain
//! errors are grouped by the component that raises them and are unified under
//! [`VellumError`], a boxed wrapper around [`VellumErrorKind`].

mod backend;
mod configuration;
mod conflict;
mod database;
mod not_found;
mod provider;
mod publish;
mod validation;

pub use backend::BackendError;
pub use configuration::{ConfigurationError, ConfigurationErrorKind};
pub use conflict::{ConflictError, ConflictErrorKind};
pub use database::{DatabaseError, DatabaseErrorKind};
pub use not_found::{NotFoundError, NotFoundErrorKind};
pub use provider::{ProviderError, ProviderErrorKind, RetryableError};
pub use publish::{PublishError, PublishErrorKind};
pub use validation::ValidationError;

/// Crate-level error variants.
#[derive(Debug, derive_more::From, derive_more::Display)]
pub enum VellumErrorKind {
    /// Model selection or settings could not be resolved
    #[display("{_0}")]
    Configuration(ConfigurationError),
    /// External provider call failed
    #[display("{_0}")]
    Provider(ProviderError),
    /// Operation conflicts with the current state of a version
    #[display("{_0}")]
    Conflict(ConflictError),
    /// Progress event could not be delivered
    #[display("{_0}")]
    Publish(PublishError),
    /// Referenced entity does not exist
    #[display("{_0}")]
    NotFound(NotFoundError),
    /// Caller input is out of bounds
    #[display("{_0}")]
    Validation(ValidationError),
    /// Persistence layer failure
    #[display("{_0}")]
    Database(DatabaseError),
    /// Internal failure not covered by another variant
    #[display("{_0}")]
    Backend(BackendError),
}

/// Vellum error with kind discrimination.
#[derive(Debug, derive_more::Display)]
#[display("Vellum Error: {_0}")]
pub struct VellumError(Box<VellumErrorKind>);

impl VellumError {
    /// Create a new error from a kind.
    pub fn new(kind: VellumErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &VellumErrorKind {
        &self.0
    }

    /// Returns true if the error reports a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(*self.0, VellumErrorKind::NotFound(_))
    }

    /// Returns true if the error reports a state conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(*self.0, VellumErrorKind::Conflict(_))
    }

    /// Returns true if the error was raised while resolving configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(*self.0, VellumErrorKind::Configuration(_))
    }

    /// Returns true if the error rejects caller input.
    pub fn is_validation(&self) -> bool {
        matches!(*self.0, VellumErrorKind::Validation(_))
    }
}

impl std::error::Error for VellumError {}

// Generic From implementation for any type that converts to VellumErrorKind
impl<T> From<T> for VellumError
where
    T: Into<VellumErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

#[cfg(feature = "database")]
impl From<diesel::result::Error> for VellumErrorKind {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        VellumErrorKind::Database(DatabaseError::from(err))
    }
}

/// Result type for Vellum operations.
pub type VellumResult<T> = std::result::Result<T, VellumError>;
