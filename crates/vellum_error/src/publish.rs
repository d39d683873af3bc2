//! Progress publishing error types.
//!
//! Publishing is best effort: these errors are logged by callers and never
//! fail a generation.

/// Publish error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum PublishErrorKind {
    /// Subscriber dropped its receiving end
    #[display("Subscriber {subscriber} for proposal {proposal} is no longer connected")]
    SubscriberClosed {
        /// Proposal the event was scoped to
        proposal: i64,
        /// Subscriber identifier
        subscriber: u64,
    },
    /// Publisher is shut down
    #[display("Progress publisher is closed")]
    Closed,
}

/// Transient publish error with source location.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Publish Error: {} at line {} in {}", kind, line, file)]
pub struct PublishError {
    /// The kind of error that occurred
    pub kind: PublishErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl PublishError {
    /// Create a new PublishError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PublishErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
