//! In-memory implementation of VersionStore.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use vellum_core::{
    BatchId, ProposalId, ProposalVersion, Rating, VersionId, VersionStatus,
};
use vellum_error::{NotFoundError, NotFoundErrorKind, ValidationError, VellumResult};
use vellum_interface::{NewBatch, VersionCompletion, VersionStore};

/// Per-proposal counter and selection.
#[derive(Debug, Clone, Copy, Default)]
struct Head {
    last_version_number: i32,
    selected: Option<VersionId>,
}

#[derive(Debug, Default)]
struct State {
    versions: BTreeMap<VersionId, ProposalVersion>,
    heads: HashMap<ProposalId, Head>,
    next_id: i64,
}

impl State {
    fn get(&self, id: VersionId) -> Result<&ProposalVersion, NotFoundError> {
        self.versions
            .get(&id)
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Version(id.0)))
    }

    fn get_mut(&mut self, id: VersionId) -> Result<&mut ProposalVersion, NotFoundError> {
        self.versions
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Version(id.0)))
    }

    fn sorted<F>(&self, predicate: F) -> Vec<ProposalVersion>
    where
        F: Fn(&ProposalVersion) -> bool,
    {
        let mut found: Vec<_> = self
            .versions
            .values()
            .filter(|v| predicate(v))
            .cloned()
            .collect();
        found.sort_by_key(|v| (v.proposal_id, v.version_number));
        found
    }
}

/// Version store kept behind a single async mutex.
///
/// One lock guards versions and per-proposal heads together, so number
/// allocation and selection changes are atomic with respect to each other.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVersionStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryVersionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored versions (for testing).
    pub async fn len(&self) -> usize {
        self.state.lock().await.versions.len()
    }

    /// Check if the store is empty (for testing).
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.versions.is_empty()
    }
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    #[instrument(skip(self, batch), fields(proposal_id = %batch.proposal_id(), batch_id = %batch.batch_id(), count = batch.versions().len()))]
    async fn create_batch(&self, batch: NewBatch) -> VellumResult<Vec<ProposalVersion>> {
        if batch.versions().is_empty() {
            return Err(ValidationError::new("a batch needs at least one version").into());
        }

        let mut state = self.state.lock().await;
        let proposal_id = *batch.proposal_id();
        if let Some(parent_id) = *batch.parent_version_id() {
            state.get(parent_id)?.ensure_can_parent(proposal_id)?;
        }

        let first_number = state
            .heads
            .get(&proposal_id)
            .map(|h| h.last_version_number)
            .unwrap_or(0)
            + 1;
        let now = Utc::now();
        let mut created = Vec::with_capacity(batch.versions().len());

        for (offset, new_version) in batch.versions().iter().enumerate() {
            state.next_id += 1;
            let version = ProposalVersion {
                id: VersionId(state.next_id),
                proposal_id,
                version_number: first_number + offset as i32,
                batch_id: *batch.batch_id(),
                model_id: new_version.model_id,
                model_name: new_version.model_name.clone(),
                provider: new_version.provider,
                status: VersionStatus::Pending,
                parent_version_id: *batch.parent_version_id(),
                iteration_feedback: batch.iteration_feedback().clone(),
                request: batch.request().clone(),
                created_at: now,
                started_at: None,
                finished_at: None,
                duration_ms: None,
                tokens_used: None,
                content: None,
                error: None,
                rating: None,
                selected: false,
            };
            state.versions.insert(version.id, version.clone());
            created.push(version);
        }

        let head = state.heads.entry(proposal_id).or_default();
        head.last_version_number = first_number + created.len() as i32 - 1;
        debug!(
            first = first_number,
            last = head.last_version_number,
            "Allocated version numbers"
        );
        Ok(created)
    }

    async fn get_version(&self, id: VersionId) -> VellumResult<ProposalVersion> {
        Ok(self.state.lock().await.get(id)?.clone())
    }

    async fn get_versions(&self, ids: &[VersionId]) -> VellumResult<Vec<ProposalVersion>> {
        let state = self.state.lock().await;
        ids.iter()
            .map(|id| state.get(*id).cloned().map_err(Into::into))
            .collect()
    }

    async fn list_versions(&self, proposal_id: ProposalId) -> VellumResult<Vec<ProposalVersion>> {
        Ok(self
            .state
            .lock()
            .await
            .sorted(|v| v.proposal_id == proposal_id))
    }

    async fn batch_versions(&self, batch_id: BatchId) -> VellumResult<Vec<ProposalVersion>> {
        let found = self.state.lock().await.sorted(|v| v.batch_id == batch_id);
        if found.is_empty() {
            return Err(NotFoundError::new(NotFoundErrorKind::Batch(batch_id.to_string())).into());
        }
        Ok(found)
    }

    #[instrument(skip(self))]
    async fn mark_generating(&self, id: VersionId) -> VellumResult<ProposalVersion> {
        let mut state = self.state.lock().await;
        let version = state.get_mut(id)?;
        version.ensure_transition(VersionStatus::Generating)?;
        version.status = VersionStatus::Generating;
        version.started_at = Some(Utc::now());
        Ok(version.clone())
    }

    #[instrument(skip(self, completion), fields(tokens = completion.tokens_used))]
    async fn complete_version(
        &self,
        id: VersionId,
        completion: VersionCompletion,
    ) -> VellumResult<ProposalVersion> {
        let mut state = self.state.lock().await;
        let version = state.get_mut(id)?;
        version.ensure_transition(VersionStatus::Completed)?;
        version.status = VersionStatus::Completed;
        version.content = Some(completion.content);
        version.tokens_used = Some(completion.tokens_used);
        version.duration_ms = Some(completion.duration_ms);
        version.finished_at = Some(Utc::now());
        Ok(version.clone())
    }

    #[instrument(skip(self))]
    async fn fail_version(
        &self,
        id: VersionId,
        error: String,
        duration_ms: Option<u64>,
    ) -> VellumResult<ProposalVersion> {
        let mut state = self.state.lock().await;
        let version = state.get_mut(id)?;
        version.ensure_transition(VersionStatus::Failed)?;
        version.status = VersionStatus::Failed;
        version.error = Some(error);
        version.duration_ms = duration_ms;
        version.finished_at = Some(Utc::now());
        Ok(version.clone())
    }

    async fn rate_version(&self, id: VersionId, rating: Rating) -> VellumResult<ProposalVersion> {
        let mut state = self.state.lock().await;
        let version = state.get_mut(id)?;
        version.ensure_ratable()?;
        version.rating = Some(rating);
        Ok(version.clone())
    }

    #[instrument(skip(self))]
    async fn select_version(&self, id: VersionId) -> VellumResult<ProposalVersion> {
        let mut state = self.state.lock().await;
        let candidate = state.get(id)?;
        candidate.ensure_selectable()?;
        let proposal_id = candidate.proposal_id;

        let previous = state.heads.get(&proposal_id).and_then(|h| h.selected);
        if let Some(previous) = previous
            && let Some(old) = state.versions.get_mut(&previous)
        {
            old.selected = false;
        }
        let version = state.get_mut(id)?;
        version.selected = true;
        let selected = version.clone();
        state.heads.entry(proposal_id).or_default().selected = Some(id);

        debug!(proposal_id = %proposal_id, previous = ?previous, "Selected version");
        Ok(selected)
    }

    async fn selected_version(
        &self,
        proposal_id: ProposalId,
    ) -> VellumResult<Option<ProposalVersion>> {
        let state = self.state.lock().await;
        Ok(state
            .heads
            .get(&proposal_id)
            .and_then(|h| h.selected)
            .and_then(|id| state.versions.get(&id).cloned()))
    }

    async fn children(&self, id: VersionId) -> VellumResult<Vec<ProposalVersion>> {
        let state = self.state.lock().await;
        state.get(id)?;
        Ok(state.sorted(|v| v.parent_version_id == Some(id)))
    }
}
