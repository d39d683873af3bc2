//! Registry of configured models.

use crate::{AtomicStats, ModelLimiter};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use vellum_core::{GenerationParams, ModelConfig, ModelId, ModelLimits, ModelStats};
use vellum_error::{
    ConfigurationError, ConfigurationErrorKind, NotFoundError, NotFoundErrorKind, ProviderError,
    ProviderErrorKind, VellumResult,
};
use vellum_interface::{ModelCatalog, ProviderAdapter};
use vellum_models::ProviderClient;

/// Everything a generation unit needs from one model.
#[derive(Clone, derive_getters::Getters)]
pub struct ResolvedModel {
    /// Configuration snapshot taken at dispatch time
    config: ModelConfig,
    /// Backend adapter
    adapter: Arc<dyn ProviderAdapter>,
    /// Admission limiter shared by every unit of this model
    limiter: Arc<ModelLimiter>,
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("config", &self.config)
            .field("adapter", &self.adapter.model_name())
            .finish_non_exhaustive()
    }
}

/// Result of a single-attempt connection check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCheck {
    /// The provider answered
    pub success: bool,
    /// Generated text on success
    pub response: Option<String>,
    /// Failure summary otherwise
    pub error: Option<String>,
    /// Wall time of the attempt
    pub duration_ms: u64,
    /// Tokens reported on success
    pub tokens_used: Option<u64>,
}

struct Entry {
    config: ModelConfig,
    adapter: Arc<dyn ProviderAdapter>,
    limiter: Arc<ModelLimiter>,
    stats: Arc<AtomicStats>,
}

/// Configured provider adapters with enablement, default flag and statistics.
///
/// Models are kept ordered by id. Counter updates only take a read lock, so
/// concurrent outcomes never wait on each other.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: Arc<RwLock<BTreeMap<ModelId, Entry>>>,
    catalog: Option<Arc<dyn ModelCatalog>>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("persistent", &self.catalog.is_some())
            .finish_non_exhaustive()
    }
}

impl ModelRegistry {
    /// Create an empty in-memory registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry writing configurations and counters through
    /// to `catalog`.
    pub fn with_catalog(catalog: Arc<dyn ModelCatalog>) -> Self {
        Self {
            models: Arc::default(),
            catalog: Some(catalog),
        }
    }

    /// Build adapters for every configured model.
    ///
    /// Fails on the first model whose adapter cannot be built.
    #[instrument(skip(configs), fields(count = configs.len()))]
    pub async fn from_settings(configs: &[ModelConfig]) -> VellumResult<Self> {
        let registry = Self::new();
        for config in configs {
            registry.register_config(config.clone()).await?;
        }
        info!(models = configs.len(), "Model registry built from settings");
        Ok(registry)
    }

    /// Load every model stored in `catalog`, seeding counters from it, and
    /// keep writing through to it.
    #[instrument(skip(catalog))]
    pub async fn load_from_catalog(catalog: Arc<dyn ModelCatalog>) -> VellumResult<Self> {
        let stored = catalog.load_models().await?;
        let registry = Self::with_catalog(catalog);
        {
            let mut models = registry.models.write().await;
            for (config, stats) in stored {
                let adapter: Arc<dyn ProviderAdapter> =
                    Arc::new(ProviderClient::from_config(&config)?);
                debug!(model_id = %config.id(), "Loaded model from catalog");
                models.insert(
                    *config.id(),
                    Entry {
                        limiter: Arc::new(ModelLimiter::new(config.limits())),
                        stats: Arc::new(AtomicStats::from_snapshot(&stats)),
                        config,
                        adapter,
                    },
                );
            }
            info!(models = models.len(), "Model registry loaded from catalog");
        }
        Ok(registry)
    }

    /// Register a model, building its adapter from the configuration.
    pub async fn register_config(&self, config: ModelConfig) -> VellumResult<()> {
        let adapter: Arc<dyn ProviderAdapter> = Arc::new(ProviderClient::from_config(&config)?);
        self.register(config, adapter).await
    }

    /// Register a model with an explicit adapter.
    ///
    /// Registering a default model clears the previous default.
    #[instrument(skip(self, config, adapter), fields(model_id = %config.id()))]
    pub async fn register(
        &self,
        config: ModelConfig,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> VellumResult<()> {
        {
            let mut models = self.models.write().await;
            if models.contains_key(config.id()) {
                return Err(ConfigurationError::new(ConfigurationErrorKind::DuplicateModel(
                    config.id().0,
                ))
                .into());
            }
            if *config.is_default() {
                for entry in models.values_mut() {
                    entry.config.set_default(false);
                }
            }
            models.insert(
                *config.id(),
                Entry {
                    limiter: Arc::new(ModelLimiter::new(config.limits())),
                    stats: Arc::new(AtomicStats::default()),
                    config: config.clone(),
                    adapter,
                },
            );
        }
        debug!(name = %config.name(), provider = %config.provider(), "Registered model");
        self.persist(&config).await
    }

    /// Enabled models ordered by id.
    pub async fn list_enabled(&self) -> Vec<ModelConfig> {
        self.models
            .read()
            .await
            .values()
            .filter(|e| *e.config.enabled())
            .map(|e| e.config.clone())
            .collect()
    }

    /// Every registered model ordered by id.
    pub async fn list_all(&self) -> Vec<ModelConfig> {
        self.models
            .read()
            .await
            .values()
            .map(|e| e.config.clone())
            .collect()
    }

    /// Configuration of one model.
    pub async fn get(&self, id: ModelId) -> VellumResult<ModelConfig> {
        self.models
            .read()
            .await
            .get(&id)
            .map(|e| e.config.clone())
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Model(id.0)).into())
    }

    /// The enabled model flagged default, else the lowest-id enabled model.
    pub async fn get_default(&self) -> VellumResult<ModelConfig> {
        let models = self.models.read().await;
        let mut enabled = models.values().filter(|e| *e.config.enabled());
        let first = enabled.clone().next();
        enabled
            .find(|e| *e.config.is_default())
            .or(first)
            .map(|e| e.config.clone())
            .ok_or_else(|| {
                ConfigurationError::new(ConfigurationErrorKind::NoDefaultModel).into()
            })
    }

    /// Resolve a model for dispatch.
    ///
    /// Unknown and disabled models are configuration errors.
    pub async fn resolve(&self, id: ModelId) -> Result<ResolvedModel, ConfigurationError> {
        let models = self.models.read().await;
        let entry = models
            .get(&id)
            .ok_or_else(|| ConfigurationError::new(ConfigurationErrorKind::UnknownModel(id.0)))?;
        if !*entry.config.enabled() {
            return Err(ConfigurationError::new(
                ConfigurationErrorKind::DisabledModel(id.0),
            ));
        }
        Ok(ResolvedModel {
            config: entry.config.clone(),
            adapter: Arc::clone(&entry.adapter),
            limiter: Arc::clone(&entry.limiter),
        })
    }

    /// Add one finished attempt to the model's counters.
    ///
    /// In-memory counters are always updated. A write-through failure is
    /// logged and does not fail the call.
    #[instrument(skip(self))]
    pub async fn record_outcome(
        &self,
        id: ModelId,
        success: bool,
        tokens_used: u64,
        duration_ms: u64,
    ) -> VellumResult<()> {
        let stats = {
            let models = self.models.read().await;
            let entry = models
                .get(&id)
                .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Model(id.0)))?;
            Arc::clone(&entry.stats)
        };
        stats.record(success, tokens_used, duration_ms);

        if let Some(catalog) = &self.catalog
            && let Err(e) = catalog
                .record_outcome(id, success, tokens_used, duration_ms)
                .await
        {
            warn!(model_id = %id, error = %e, "Failed to persist model statistics");
        }
        Ok(())
    }

    /// Snapshot of a model's counters.
    pub async fn stats(&self, id: ModelId) -> VellumResult<ModelStats> {
        self.models
            .read()
            .await
            .get(&id)
            .map(|e| e.stats.snapshot())
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Model(id.0)).into())
    }

    /// Send one prompt straight to a model's adapter.
    ///
    /// Skips admission limits and retries, and works on disabled models. The
    /// attempt counts towards the model's statistics.
    #[instrument(skip(self, prompt))]
    pub async fn check_connection(
        &self,
        id: ModelId,
        prompt: &str,
    ) -> VellumResult<ConnectionCheck> {
        let (adapter, params) = {
            let models = self.models.read().await;
            let entry = models
                .get(&id)
                .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Model(id.0)))?;
            (Arc::clone(&entry.adapter), entry.config.params().clone())
        };

        let timeout = params.timeout();
        let started = Instant::now();
        let attempt = adapter.generate(prompt, &params, timeout);
        let result = match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::new(ProviderErrorKind::Timeout {
                after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })),
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let check = match result {
            Ok(output) => {
                self.record_outcome(id, true, output.tokens_used, duration_ms)
                    .await?;
                ConnectionCheck {
                    success: true,
                    response: Some(output.content),
                    error: None,
                    duration_ms,
                    tokens_used: Some(output.tokens_used),
                }
            }
            Err(err) => {
                warn!(model_id = %id, error = %err, "Connection check failed");
                self.record_outcome(id, false, 0, duration_ms).await?;
                ConnectionCheck {
                    success: false,
                    response: None,
                    error: Some(err.summary()),
                    duration_ms,
                    tokens_used: None,
                }
            }
        };
        Ok(check)
    }

    /// Replace a model's generation parameters.
    #[instrument(skip(self, params))]
    pub async fn update_params(&self, id: ModelId, params: GenerationParams) -> VellumResult<()> {
        let config = self
            .mutate(id, |entry| entry.config.set_params(params))
            .await?;
        self.persist(&config).await
    }

    /// Replace a model's admission limits. Units already waiting keep the old limiter.
    #[instrument(skip(self))]
    pub async fn update_limits(&self, id: ModelId, limits: ModelLimits) -> VellumResult<()> {
        let config = self
            .mutate(id, |entry| {
                entry.config.set_limits(limits);
                entry.limiter = Arc::new(ModelLimiter::new(&limits));
            })
            .await?;
        self.persist(&config).await
    }

    /// Enable or disable a model.
    #[instrument(skip(self))]
    pub async fn set_enabled(&self, id: ModelId, enabled: bool) -> VellumResult<()> {
        let config = self
            .mutate(id, |entry| entry.config.set_enabled(enabled))
            .await?;
        info!(model_id = %id, enabled, "Model enablement changed");
        self.persist(&config).await
    }

    /// Flag a model as default, clearing the previous default under the same lock.
    #[instrument(skip(self))]
    pub async fn set_default(&self, id: ModelId) -> VellumResult<()> {
        let changed = {
            let mut models = self.models.write().await;
            if !models.contains_key(&id) {
                return Err(NotFoundError::new(NotFoundErrorKind::Model(id.0)).into());
            }
            let mut changed = Vec::new();
            for (model_id, entry) in models.iter_mut() {
                let flag = *model_id == id;
                if *entry.config.is_default() != flag {
                    entry.config.set_default(flag);
                    changed.push(entry.config.clone());
                }
            }
            changed
        };
        info!(model_id = %id, "Default model changed");
        for config in &changed {
            self.persist(config).await?;
        }
        Ok(())
    }

    async fn mutate<F>(&self, id: ModelId, f: F) -> VellumResult<ModelConfig>
    where
        F: FnOnce(&mut Entry),
    {
        let mut models = self.models.write().await;
        let entry = models
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Model(id.0)))?;
        f(entry);
        Ok(entry.config.clone())
    }

    async fn persist(&self, config: &ModelConfig) -> VellumResult<()> {
        match &self.catalog {
            Some(catalog) => catalog.save_model(config).await,
            None => Ok(()),
        }
    }
}
