//! Publisher that drops every event.

use async_trait::async_trait;
use tracing::trace;
use vellum_core::ProgressEvent;
use vellum_error::PublishError;
use vellum_interface::ProgressSink;

/// Sink used when progress notifications are turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPublisher;

#[async_trait]
impl ProgressSink for DisabledPublisher {
    async fn publish(&self, event: ProgressEvent) -> Result<usize, PublishError> {
        trace!(proposal_id = %event.proposal_id, stage = %event.stage, "Progress disabled, dropping event");
        Ok(0)
    }
}
