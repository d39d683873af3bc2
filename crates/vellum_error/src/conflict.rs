//! Conflict error types.
//!
//! A conflict means the request was well-formed but the current state of a
//! version does not allow it.

/// Conflict error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ConflictErrorKind {
    /// Iteration requested from a version that has not finished
    #[display("Parent version {parent} is still {status}; iterate from a finished version")]
    ParentNotTerminal {
        /// Parent version ID
        parent: i64,
        /// Current status of the parent
        status: String,
    },
    /// Parent version belongs to a different proposal
    #[display("Parent version {parent} belongs to proposal {actual}, not {expected}")]
    ParentProposalMismatch {
        /// Parent version ID
        parent: i64,
        /// Proposal the child is created for
        expected: i64,
        /// Proposal the parent belongs to
        actual: i64,
    },
    /// Version is already the selected one
    #[display("Version {_0} is already selected")]
    AlreadySelected(i64),
    /// Version cannot be selected in its current status
    #[display("Version {version} is {status}; only completed versions can be selected")]
    NotSelectable {
        /// Version ID
        version: i64,
        /// Current status
        status: String,
    },
    /// Version cannot be rated in its current status
    #[display("Version {version} is {status}; only finished versions can be rated")]
    NotRatable {
        /// Version ID
        version: i64,
        /// Current status
        status: String,
    },
    /// Status transition is not allowed
    #[display("Version {version} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Version ID
        version: i64,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },
}

/// Conflict error with source location.
///
/// # Examples
///
/// ```
/// use vellum_error::{ConflictError, ConflictErrorKind};
///
/// let err = ConflictError::new(ConflictErrorKind::AlreadySelected(3));
/// assert!(format!("{}", err).contains("already selected"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Conflict Error: {} at line {} in {}", kind, line, file)]
pub struct ConflictError {
    /// The kind of error that occurred
    pub kind: ConflictErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ConflictError {
    /// Create a new ConflictError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ConflictErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
