//! Progress publishing trait.

use async_trait::async_trait;
use vellum_core::ProgressEvent;
use vellum_error::PublishError;

/// Destination for progress events.
///
/// Publishing is best effort. Callers log failures and carry on, so an
/// implementation that drops everything leaves the engine correct.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Deliver an event to every subscriber of its proposal.
    ///
    /// Returns the number of subscribers that received the event. An error
    /// reports a subscriber that went away; the others still received it.
    async fn publish(&self, event: ProgressEvent) -> Result<usize, PublishError>;
}
