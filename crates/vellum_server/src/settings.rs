//! Layered engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};
use vellum_core::{LogFormat, ModelConfig, Proposal};
use vellum_error::{ConfigurationError, ConfigurationErrorKind};
use vellum_models::RetryPolicy;
use vellum_orchestrator::OrchestratorSettings;

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to bind
    bind: String,
    /// Log output format
    log_format: LogFormat,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// PostgreSQL settings. Without a URL the engine keeps everything in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection URL
    url: Option<String>,
    /// Pool size
    max_connections: u32,
    /// Apply embedded migrations at startup
    run_migrations: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            run_migrations: true,
        }
    }
}

/// Batch limits and retry backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct GenerationSettings {
    /// Upper bound on models per dispatch
    max_models_per_batch: usize,
    /// Upper bound on versions per comparison
    max_compare: usize,
    /// First retry delay in milliseconds
    initial_backoff_ms: u64,
    /// Cap on any retry delay in milliseconds
    max_backoff_ms: u64,
    /// Growth factor between retries
    backoff_multiplier: f64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_models_per_batch: 8,
            max_compare: 10,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Progress notification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct ProgressSettings {
    /// Publish progress events and serve the SSE endpoint
    enabled: bool,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Complete engine configuration.
///
/// # Examples
///
/// ```
/// use vellum_server::EngineSettings;
///
/// let settings = EngineSettings::from_toml_str(r#"
///     [generation]
///     max_models_per_batch = 3
///
///     [[models]]
///     id = 1
///     name = "DeepSeek Chat"
///     provider = "deepseek"
///     model_name = "deepseek-chat"
/// "#).unwrap();
/// assert_eq!(*settings.generation().max_models_per_batch(), 3);
/// assert_eq!(settings.models().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct EngineSettings {
    /// HTTP listener
    server: ServerSettings,
    /// Persistence
    database: DatabaseSettings,
    /// Batch limits and retries
    generation: GenerationSettings,
    /// Progress notifications
    progress: ProgressSettings,
    /// Models registered at startup
    models: Vec<ModelConfig>,
    /// Proposal records seeded into the in-memory source
    proposals: Vec<Proposal>,
}

fn settings_error(err: config::ConfigError) -> ConfigurationError {
    ConfigurationError::new(ConfigurationErrorKind::Settings(err.to_string()))
}

impl EngineSettings {
    /// Load settings from an optional TOML file, overridden by `VELLUM__*`
    /// environment variables (`VELLUM__SERVER__BIND`, `VELLUM__DATABASE__URL`, ...).
    #[instrument(name = "settings.load")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings: Self = builder
            .add_source(
                config::Environment::with_prefix("VELLUM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(settings_error)?
            .try_deserialize()
            .map_err(settings_error)?;
        debug!(models = settings.models.len(), "Settings loaded");
        Ok(settings)
    }

    /// Parse settings from TOML text, without environment overrides.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigurationError> {
        config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()
            .map_err(settings_error)?
            .try_deserialize()
            .map_err(settings_error)
    }

    /// Replace the bind address.
    pub fn set_bind(&mut self, bind: impl Into<String>) {
        self.server.bind = bind.into();
    }

    /// Replace the database URL.
    pub fn set_database_url(&mut self, url: Option<String>) {
        self.database.url = url;
    }

    /// Retry backoff curve. Retry counts come from each model's parameters.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(self.generation.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.generation.max_backoff_ms),
            backoff_multiplier: self.generation.backoff_multiplier,
            ..RetryPolicy::default()
        }
    }

    /// Orchestrator tuning derived from these settings.
    pub fn orchestrator_settings(&self) -> Result<OrchestratorSettings, ConfigurationError> {
        if self.generation.max_models_per_batch == 0 {
            return Err(ConfigurationError::new(ConfigurationErrorKind::Settings(
                "generation.max_models_per_batch must be at least 1".to_string(),
            )));
        }
        if self.generation.max_compare < 2 {
            return Err(ConfigurationError::new(ConfigurationErrorKind::Settings(
                "generation.max_compare must be at least 2".to_string(),
            )));
        }
        OrchestratorSettings::builder()
            .max_models_per_batch(self.generation.max_models_per_batch)
            .max_compare(self.generation.max_compare)
            .retry(self.retry_policy())
            .build()
            .map_err(|e| ConfigurationError::new(ConfigurationErrorKind::Settings(e.to_string())))
    }
}
