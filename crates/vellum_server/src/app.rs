//! Component assembly from [`EngineSettings`].

use crate::api::ApiState;
use crate::settings::EngineSettings;
use std::sync::Arc;
use tracing::{info, instrument};
use vellum_database::{
    PostgresModelCatalog, PostgresProposalSource, PostgresVersionStore, create_pool,
    run_migrations,
};
use vellum_error::{BackendError, VellumResult};
use vellum_interface::{ModelCatalog, ProgressSink};
use vellum_orchestrator::Orchestrator;
use vellum_progress::{DisabledPublisher, ProgressHub};
use vellum_registry::ModelRegistry;
use vellum_store::{InMemoryProposalSource, InMemoryVersionStore};

fn progress_sink(settings: &EngineSettings) -> (Option<ProgressHub>, Arc<dyn ProgressSink>) {
    if *settings.progress().enabled() {
        let hub = ProgressHub::new();
        (Some(hub.clone()), Arc::new(hub))
    } else {
        (None, Arc::new(DisabledPublisher))
    }
}

/// Build an engine that keeps versions and proposals in memory.
///
/// Proposals listed in the settings are seeded. The returned source is
/// shared with the engine so callers can add more.
#[instrument(skip_all, fields(models = settings.models().len()))]
pub async fn build_in_memory(
    settings: &EngineSettings,
) -> VellumResult<(ApiState, InMemoryProposalSource)> {
    let registry = ModelRegistry::from_settings(settings.models()).await?;
    let proposals = InMemoryProposalSource::new();
    for proposal in settings.proposals() {
        proposals.insert(proposal.clone()).await;
    }
    let (hub, sink) = progress_sink(settings);
    let orchestrator = Orchestrator::new(
        registry,
        Arc::new(InMemoryVersionStore::new()),
        Arc::new(proposals.clone()),
        sink,
        settings.orchestrator_settings()?,
    );
    info!(progress = hub.is_some(), "In-memory engine ready");
    Ok((ApiState::new(orchestrator, hub), proposals))
}

/// Build an engine backed by PostgreSQL.
///
/// Models stored in the catalog win over settings entries with the same id;
/// settings models missing from the catalog are registered and persisted.
#[instrument(skip_all, fields(models = settings.models().len()))]
pub async fn build_postgres(settings: &EngineSettings, database_url: &str) -> VellumResult<ApiState> {
    let url = database_url.to_string();
    let max_connections = *settings.database().max_connections();
    let migrate = *settings.database().run_migrations();
    let pool = tokio::task::spawn_blocking(move || -> VellumResult<_> {
        let pool = create_pool(&url, max_connections)?;
        if migrate {
            run_migrations(&pool)?;
        }
        Ok(pool)
    })
    .await
    .map_err(|e| BackendError::new(format!("Database setup task failed: {}", e)))??;

    let catalog: Arc<dyn ModelCatalog> = Arc::new(PostgresModelCatalog::new(pool.clone()));
    let registry = ModelRegistry::load_from_catalog(catalog).await?;
    let mut seeded = 0;
    for config in settings.models() {
        if registry.get(*config.id()).await.is_err() {
            registry.register_config(config.clone()).await?;
            seeded += 1;
        }
    }

    let (hub, sink) = progress_sink(settings);
    let orchestrator = Orchestrator::new(
        registry,
        Arc::new(PostgresVersionStore::new(pool.clone())),
        Arc::new(PostgresProposalSource::new(pool)),
        sink,
        settings.orchestrator_settings()?,
    );
    info!(seeded, progress = hub.is_some(), "PostgreSQL engine ready");
    Ok(ApiState::new(orchestrator, hub))
}
