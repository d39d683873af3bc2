//! Progress notifications for a proposal.

use crate::{BatchId, ProposalId, VersionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage reported by a progress event.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProgressStage {
    /// Batch accepted, units waiting for admission
    Connecting,
    /// A unit started its provider call
    Generating,
    /// A unit finished, others may still be running
    Processing,
    /// Batch finished with at least one success
    Completed,
    /// Batch finished without any success
    Error,
}

impl ProgressStage {
    /// Returns true for the two stages that end a batch.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressStage::Completed | ProgressStage::Error)
    }
}

/// One progress notification scoped to a proposal.
///
/// # Examples
///
/// ```
/// use vellum_core::{ProgressEvent, ProgressStage, ProposalId};
///
/// let event = ProgressEvent::new(ProposalId(7), ProgressStage::Processing, 140, "1 of 2 done");
/// assert_eq!(event.progress, 100);
/// assert!(event.batch_id.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Proposal the event belongs to
    pub proposal_id: ProposalId,
    /// Reported stage
    pub stage: ProgressStage,
    /// Completion percentage, 0 to 100
    pub progress: u8,
    /// Human-readable message
    pub message: String,
    /// Batch the event describes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
    /// Version the event describes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<VersionId>,
    /// Emission time
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    /// Event type name used on the wire.
    pub const EVENT_TYPE: &'static str = "proposal_progress";

    /// Create an event stamped with the current time. Progress above 100 is clamped.
    pub fn new(
        proposal_id: ProposalId,
        stage: ProgressStage,
        progress: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            proposal_id,
            stage,
            progress: progress.min(100),
            message: message.into(),
            batch_id: None,
            version_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the batch identifier.
    pub fn with_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    /// Attach the version identifier.
    pub fn with_version(mut self, version_id: VersionId) -> Self {
        self.version_id = Some(version_id);
        self
    }
}
