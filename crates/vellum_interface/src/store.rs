//! Version store trait and its input records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vellum_core::{
    BatchId, ModelId, ProposalId, ProposalRequest, ProposalVersion, ProviderKind, Rating,
    VersionContent, VersionId,
};
use vellum_error::VellumResult;

/// Model assignment for one version of a new batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct NewVersion {
    /// Model to generate with
    pub model_id: ModelId,
    /// Model display name snapshot
    pub model_name: String,
    /// Provider family snapshot
    pub provider: ProviderKind,
}

/// Everything needed to create the rows of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct NewBatch {
    /// Owning proposal
    proposal_id: ProposalId,
    /// Shared batch identifier
    batch_id: BatchId,
    /// Parent version when iterating
    parent_version_id: Option<VersionId>,
    /// Feedback that triggered the iteration
    iteration_feedback: Option<String>,
    /// Payload stored on every row
    request: ProposalRequest,
    /// One entry per version, in allocation order
    versions: Vec<NewVersion>,
}

impl NewBatch {
    /// Batch for a first generation.
    pub fn new(
        proposal_id: ProposalId,
        batch_id: BatchId,
        request: ProposalRequest,
        versions: Vec<NewVersion>,
    ) -> Self {
        Self {
            proposal_id,
            batch_id,
            parent_version_id: None,
            iteration_feedback: None,
            request,
            versions,
        }
    }

    /// Mark the batch as an iteration of `parent`.
    pub fn with_parent(mut self, parent: VersionId, feedback: Option<String>) -> Self {
        self.parent_version_id = Some(parent);
        self.iteration_feedback = feedback;
        self
    }
}

/// Result of a successful generation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct VersionCompletion {
    /// Parsed content
    pub content: VersionContent,
    /// Tokens consumed
    pub tokens_used: u64,
    /// Generation duration in milliseconds
    pub duration_ms: u64,
}

/// Durable persistence of proposal versions.
///
/// Implementations own version numbering and the parent, status and
/// selection invariants. Every method that targets a single version returns
/// `NotFound` when it does not exist.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Atomically allocate consecutive version numbers and insert one
    /// `pending` row per entry of `batch.versions()`.
    ///
    /// Fails with `Conflict` when the parent belongs to another proposal or
    /// is not terminal. No row is created on failure.
    async fn create_batch(&self, batch: NewBatch) -> VellumResult<Vec<ProposalVersion>>;

    /// Load one version.
    async fn get_version(&self, id: VersionId) -> VellumResult<ProposalVersion>;

    /// Load several versions in the order requested.
    async fn get_versions(&self, ids: &[VersionId]) -> VellumResult<Vec<ProposalVersion>>;

    /// All versions of a proposal ordered by version number.
    async fn list_versions(&self, proposal_id: ProposalId) -> VellumResult<Vec<ProposalVersion>>;

    /// Members of a batch ordered by version number.
    async fn batch_versions(&self, batch_id: BatchId) -> VellumResult<Vec<ProposalVersion>>;

    /// Move a pending version to `generating` and stamp its start time.
    async fn mark_generating(&self, id: VersionId) -> VellumResult<ProposalVersion>;

    /// Store the content of a generating version and mark it `completed`.
    async fn complete_version(
        &self,
        id: VersionId,
        completion: VersionCompletion,
    ) -> VellumResult<ProposalVersion>;

    /// Store an error summary and mark the version `failed`.
    async fn fail_version(
        &self,
        id: VersionId,
        error: String,
        duration_ms: Option<u64>,
    ) -> VellumResult<ProposalVersion>;

    /// Set or overwrite the rating of a terminal version.
    async fn rate_version(&self, id: VersionId, rating: Rating) -> VellumResult<ProposalVersion>;

    /// Make a completed version the proposal's selected one, clearing the
    /// previous selection in the same transaction.
    async fn select_version(&self, id: VersionId) -> VellumResult<ProposalVersion>;

    /// The proposal's selected version, if any.
    async fn selected_version(
        &self,
        proposal_id: ProposalId,
    ) -> VellumResult<Option<ProposalVersion>>;

    /// Versions whose parent is `id`, ordered by version number.
    async fn children(&self, id: VersionId) -> VellumResult<Vec<ProposalVersion>>;

    /// Chain from the root ancestor down to `id`.
    async fn lineage(&self, id: VersionId) -> VellumResult<Vec<ProposalVersion>> {
        let mut chain = vec![self.get_version(id).await?];
        while let Some(parent) = chain.last().and_then(|v| v.parent_version_id) {
            chain.push(self.get_version(parent).await?);
        }
        chain.reverse();
        debug!(version_id = %id, depth = chain.len(), "Resolved lineage");
        Ok(chain)
    }
}
