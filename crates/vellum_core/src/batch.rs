//! Generation batch handles and aggregate status.

use crate::{BatchId, ModelId, ProposalId, ProposalVersion, VersionId, VersionStatus};
use serde::{Deserialize, Serialize};

/// Aggregate status of the versions created by one dispatch.
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
pub enum BatchStatus {
    /// At least one member is still pending or generating
    InProgress,
    /// Every member completed
    Completed,
    /// Members finished with a mix of outcomes
    Partial,
    /// Every member failed
    Failed,
}

impl BatchStatus {
    /// Derive the aggregate from member statuses.
    ///
    /// Returns `None` for an empty batch.
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum_core::{BatchStatus, VersionStatus};
    ///
    /// let statuses = [VersionStatus::Completed, VersionStatus::Failed];
    /// assert_eq!(BatchStatus::aggregate(statuses), Some(BatchStatus::Partial));
    /// ```
    pub fn aggregate(statuses: impl IntoIterator<Item = VersionStatus>) -> Option<Self> {
        let mut total = 0usize;
        let mut completed = 0usize;
        let mut failed = 0usize;
        for status in statuses {
            total += 1;
            match status {
                VersionStatus::Completed => completed += 1,
                VersionStatus::Failed => failed += 1,
                VersionStatus::Pending | VersionStatus::Generating => {}
            }
        }
        if total == 0 {
            None
        } else if completed + failed < total {
            Some(BatchStatus::InProgress)
        } else if completed == total {
            Some(BatchStatus::Completed)
        } else if failed == total {
            Some(BatchStatus::Failed)
        } else {
            Some(BatchStatus::Partial)
        }
    }

    /// Returns true once no member is in flight.
    pub fn is_finished(&self) -> bool {
        !matches!(self, BatchStatus::InProgress)
    }
}

/// One version created by a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct BatchMember {
    /// Version identifier
    pub version_id: VersionId,
    /// Number scoped to the proposal
    pub version_number: i32,
    /// Model assigned to the version
    pub model_id: ModelId,
    /// Model display name
    pub model_name: String,
}

/// Returned by dispatch once every version row exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct BatchHandle {
    /// Shared batch identifier
    batch_id: BatchId,
    /// Proposal the batch belongs to
    proposal_id: ProposalId,
    /// Parent version when iterating
    parent_version_id: Option<VersionId>,
    /// Created versions in allocation order
    versions: Vec<BatchMember>,
}

impl BatchHandle {
    /// Build a handle from freshly created versions.
    pub fn from_versions(
        batch_id: BatchId,
        proposal_id: ProposalId,
        parent_version_id: Option<VersionId>,
        versions: &[ProposalVersion],
    ) -> Self {
        Self {
            batch_id,
            proposal_id,
            parent_version_id,
            versions: versions
                .iter()
                .map(|v| BatchMember::new(v.id, v.version_number, v.model_id, v.model_name.clone()))
                .collect(),
        }
    }

    /// Version identifiers in allocation order.
    pub fn version_ids(&self) -> Vec<VersionId> {
        self.versions.iter().map(|m| m.version_id).collect()
    }
}

/// Aggregate view of a batch for polling clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Batch identifier
    pub batch_id: BatchId,
    /// Derived aggregate status
    pub status: BatchStatus,
    /// Members ordered by version number
    pub versions: Vec<ProposalVersion>,
}
