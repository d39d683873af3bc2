//! Dispatch, supervision and version curation.

use crate::settings::OrchestratorSettings;
use crate::unit::{Tally, report_aborted, run_unit};
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};
use vellum_core::{
    BatchHandle, BatchId, BatchStatus, BatchSummary, ModelId, ProgressEvent, ProgressStage,
    ProposalId, ProposalRequest, ProposalStatus, ProposalVersion, Rating, VersionId,
    VersionStatus,
};
use vellum_error::{
    BackendError, ConfigurationError, ConfigurationErrorKind, ConflictError, ConflictErrorKind,
    ValidationError, VellumResult,
};
use vellum_interface::{
    NewBatch, NewVersion, ProgressSink, ProposalSource, VersionStore,
};
use vellum_registry::{ModelRegistry, ResolvedModel};

/// Collaborators shared by the orchestrator and its background tasks.
pub(crate) struct Engine {
    pub(crate) registry: ModelRegistry,
    pub(crate) store: Arc<dyn VersionStore>,
    pub(crate) proposals: Arc<dyn ProposalSource>,
    pub(crate) progress: Arc<dyn ProgressSink>,
    pub(crate) settings: OrchestratorSettings,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: crate::GenerationMetrics,
}

impl Engine {
    /// Publish best effort.
    pub(crate) async fn publish(&self, event: ProgressEvent) {
        let proposal_id = event.proposal_id;
        let stage = event.stage;
        if let Err(err) = self.progress.publish(event).await {
            warn!(proposal_id = %proposal_id, stage = %stage, error = %err, "Progress event not delivered");
        }
    }

    /// Record a unit outcome on the registry, logging failures.
    pub(crate) async fn record_outcome(
        &self,
        model_id: ModelId,
        success: bool,
        tokens_used: u64,
        duration_ms: u64,
    ) {
        if let Err(err) = self
            .registry
            .record_outcome(model_id, success, tokens_used, duration_ms)
            .await
        {
            warn!(model_id = %model_id, error = %err, "Model statistics not recorded");
        }
    }

    /// Whether a different batch of the proposal still has unfinished
    /// versions. Lookup failures count as not running.
    async fn other_batch_running(&self, proposal_id: ProposalId, batch_id: BatchId) -> bool {
        match self.store.list_versions(proposal_id).await {
            Ok(versions) => versions
                .iter()
                .any(|v| v.batch_id != batch_id && !v.is_terminal()),
            Err(err) => {
                warn!(proposal_id = %proposal_id, error = %err, "Could not check sibling batches");
                false
            }
        }
    }

    async fn set_proposal_status(&self, proposal_id: ProposalId, status: ProposalStatus) {
        if let Err(err) = self.proposals.set_status(proposal_id, status).await {
            warn!(proposal_id = %proposal_id, status = %status, error = %err, "Proposal status not updated");
        }
    }
}

/// A batch whose rows exist and whose generation runs in the background.
#[derive(Debug)]
pub struct DispatchedBatch {
    /// Serializable description of the created versions
    pub handle: BatchHandle,
    /// Supervisor task; resolves with the final aggregate once every unit finished
    pub join: JoinHandle<VellumResult<BatchSummary>>,
}

/// Multi-model generation engine.
///
/// Cloning is cheap; clones share collaborators.
#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<Engine>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settings", &self.engine.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Assemble an orchestrator from its collaborators.
    pub fn new(
        registry: ModelRegistry,
        store: Arc<dyn VersionStore>,
        proposals: Arc<dyn ProposalSource>,
        progress: Arc<dyn ProgressSink>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            engine: Arc::new(Engine {
                registry,
                store,
                proposals,
                progress,
                settings,
                #[cfg(feature = "metrics")]
                metrics: crate::GenerationMetrics::new(),
            }),
        }
    }

    /// Model registry used for dispatch.
    pub fn registry(&self) -> &ModelRegistry {
        &self.engine.registry
    }

    /// Active settings.
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.engine.settings
    }

    /// Start generating one version per model.
    ///
    /// Every precondition is checked before any row is written: the model
    /// selection resolves to enabled models, the proposal exists, and the
    /// parent (when given) is a terminal version of the same proposal.
    /// Returns as soon as the rows exist; generation continues in the
    /// background and reports through the progress sink.
    ///
    /// When `request` is `None` the payload is built from the proposal record.
    #[instrument(skip(self, model_ids, request), fields(proposal_id = %proposal_id, models = model_ids.len()))]
    pub async fn dispatch(
        &self,
        proposal_id: ProposalId,
        model_ids: &[ModelId],
        request: Option<ProposalRequest>,
        parent_version_id: Option<VersionId>,
    ) -> VellumResult<DispatchedBatch> {
        self.dispatch_batch(proposal_id, model_ids, request, parent_version_id, None)
            .await
    }

    /// Generate improved versions from `parent_version_id` using `feedback`.
    ///
    /// The parent's stored payload is extended with the feedback and the
    /// parent's content, then dispatched as a new batch whose versions point
    /// at the parent.
    #[instrument(skip(self, feedback, model_ids), fields(parent_version_id = %parent_version_id, models = model_ids.len()))]
    pub async fn iterate(
        &self,
        parent_version_id: VersionId,
        feedback: &str,
        model_ids: &[ModelId],
    ) -> VellumResult<DispatchedBatch> {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(ValidationError::new("Iteration feedback must not be empty").into());
        }

        let parent = self.engine.store.get_version(parent_version_id).await?;
        if !parent.is_terminal() {
            return Err(ConflictError::new(ConflictErrorKind::ParentNotTerminal {
                parent: parent.id.0,
                status: parent.status.to_string(),
            })
            .into());
        }
        let previous = parent
            .content
            .as_ref()
            .map(|c| c.full_content.clone())
            .unwrap_or_default();
        let request = parent.request.iterate(feedback, previous);

        self.dispatch_batch(
            parent.proposal_id,
            model_ids,
            Some(request),
            Some(parent.id),
            Some(feedback.to_string()),
        )
        .await
    }

    async fn dispatch_batch(
        &self,
        proposal_id: ProposalId,
        model_ids: &[ModelId],
        request: Option<ProposalRequest>,
        parent_version_id: Option<VersionId>,
        feedback: Option<String>,
    ) -> VellumResult<DispatchedBatch> {
        let models = self.resolve_models(model_ids).await?;
        let proposal = self.engine.proposals.get_proposal(proposal_id).await?;
        let request = request.unwrap_or_else(|| ProposalRequest::from_proposal(&proposal));

        let batch_id = BatchId::new_v4();
        let entries = models
            .iter()
            .map(|m| {
                NewVersion::new(
                    *m.config().id(),
                    m.config().name().clone(),
                    *m.config().provider(),
                )
            })
            .collect();
        let mut batch = NewBatch::new(proposal_id, batch_id, request, entries);
        if let Some(parent) = parent_version_id {
            batch = batch.with_parent(parent, feedback);
        }
        let versions = self.engine.store.create_batch(batch).await?;

        let handle = BatchHandle::from_versions(batch_id, proposal_id, parent_version_id, &versions);
        info!(batch_id = %batch_id, versions = versions.len(), "Batch dispatched");

        self.engine
            .set_proposal_status(proposal_id, ProposalStatus::Generating)
            .await;
        self.engine
            .publish(
                ProgressEvent::new(
                    proposal_id,
                    ProgressStage::Connecting,
                    0,
                    format!("Generating {} versions", versions.len()),
                )
                .with_batch(batch_id),
            )
            .await;

        let join = tokio::spawn(supervise(
            Arc::clone(&self.engine),
            proposal_id,
            batch_id,
            versions.into_iter().zip(models).collect(),
        ));
        Ok(DispatchedBatch { handle, join })
    }

    async fn resolve_models(&self, model_ids: &[ModelId]) -> VellumResult<Vec<ResolvedModel>> {
        if model_ids.is_empty() {
            return Err(ConfigurationError::new(ConfigurationErrorKind::EmptyModelSelection).into());
        }
        let max = *self.engine.settings.max_models_per_batch();
        if model_ids.len() > max {
            return Err(ConfigurationError::new(ConfigurationErrorKind::TooManyModels {
                requested: model_ids.len(),
                max,
            })
            .into());
        }
        let mut models = Vec::with_capacity(model_ids.len());
        for id in model_ids {
            models.push(self.engine.registry.resolve(*id).await?);
        }
        Ok(models)
    }

    /// All versions of a proposal ordered by version number.
    pub async fn list_versions(&self, proposal_id: ProposalId) -> VellumResult<Vec<ProposalVersion>> {
        self.engine.store.list_versions(proposal_id).await
    }

    /// One version.
    pub async fn version(&self, id: VersionId) -> VellumResult<ProposalVersion> {
        self.engine.store.get_version(id).await
    }

    /// Aggregate status of a batch, derived from its rows.
    #[instrument(skip(self), fields(batch_id = %batch_id))]
    pub async fn batch_status(&self, batch_id: BatchId) -> VellumResult<BatchSummary> {
        let versions = self.engine.store.batch_versions(batch_id).await?;
        let status = BatchStatus::aggregate(versions.iter().map(|v| v.status))
            .ok_or_else(|| BackendError::new("Batch has no members"))?;
        Ok(BatchSummary {
            batch_id,
            status,
            versions,
        })
    }

    /// Rate a terminal version from 1 to 5.
    #[instrument(skip(self), fields(version_id = %id))]
    pub async fn rate(&self, id: VersionId, rating: u8) -> VellumResult<ProposalVersion> {
        let rating = Rating::new(rating)?;
        self.engine.store.rate_version(id, rating).await
    }

    /// Make a completed version the proposal's selected one.
    #[instrument(skip(self), fields(version_id = %id))]
    pub async fn select(&self, id: VersionId) -> VellumResult<ProposalVersion> {
        let selected = self.engine.store.select_version(id).await?;
        info!(proposal_id = %selected.proposal_id, "Version selected");
        Ok(selected)
    }

    /// The proposal's selected version, if any.
    pub async fn selected(&self, proposal_id: ProposalId) -> VellumResult<Option<ProposalVersion>> {
        self.engine.store.selected_version(proposal_id).await
    }

    /// Ancestors of a version, root first, ending with the version itself.
    pub async fn lineage(&self, id: VersionId) -> VellumResult<Vec<ProposalVersion>> {
        self.engine.store.lineage(id).await
    }

    /// Direct iterations of a version.
    pub async fn children(&self, id: VersionId) -> VellumResult<Vec<ProposalVersion>> {
        self.engine.store.children(id).await
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }
}

/// Wait for every unit, then publish the outcome and settle the proposal.
#[instrument(skip(engine, units), fields(proposal_id = %proposal_id, batch_id = %batch_id, units = units.len()))]
async fn supervise(
    engine: Arc<Engine>,
    proposal_id: ProposalId,
    batch_id: BatchId,
    units: Vec<(ProposalVersion, ResolvedModel)>,
) -> VellumResult<BatchSummary> {
    let tally = Arc::new(Tally::new(units.len()));
    let mut set = JoinSet::new();
    for (version, model) in units {
        set.spawn(run_unit(
            Arc::clone(&engine),
            version,
            model,
            Arc::clone(&tally),
        ));
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(status) => debug!(status = %status, "Unit finished"),
            Err(err) => error!(error = %err, "Generation unit did not finish"),
        }
    }

    // Units that panicked left their rows behind; close them out.
    let mut versions = engine.store.batch_versions(batch_id).await?;
    for version in versions.iter_mut().filter(|v| !v.is_terminal()) {
        match engine
            .store
            .fail_version(version.id, "Generation task aborted".to_string(), None)
            .await
        {
            Ok(failed) => *version = failed,
            Err(err) => error!(version_id = %version.id, error = %err, "Could not fail orphaned version"),
        }
        report_aborted(&engine, version, &tally).await;
    }

    let status = BatchStatus::aggregate(versions.iter().map(|v| v.status))
        .ok_or_else(|| BackendError::new("Batch has no members"))?;
    let succeeded = versions
        .iter()
        .filter(|v| v.status == VersionStatus::Completed)
        .count();

    let (stage, proposal_status) = if succeeded > 0 {
        (ProgressStage::Completed, ProposalStatus::Completed)
    } else {
        (ProgressStage::Error, ProposalStatus::Failed)
    };
    engine
        .publish(
            ProgressEvent::new(
                proposal_id,
                stage,
                100,
                format!("{} of {} versions completed", succeeded, versions.len()),
            )
            .with_batch(batch_id),
        )
        .await;
    if engine.other_batch_running(proposal_id, batch_id).await {
        debug!("Another batch is still generating; proposal status left as is");
    } else {
        engine.set_proposal_status(proposal_id, proposal_status).await;
    }

    info!(status = %status, succeeded, total = versions.len(), "Batch finished");
    Ok(BatchSummary {
        batch_id,
        status,
        versions,
    })
}
