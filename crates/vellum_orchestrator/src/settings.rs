//! Orchestrator tuning.

use vellum_models::RetryPolicy;

/// Limits and retry behavior applied by the orchestrator.
///
/// # Examples
///
/// ```
/// use vellum_orchestrator::OrchestratorSettings;
///
/// let settings = OrchestratorSettings::builder()
///     .max_models_per_batch(3_usize)
///     .build()
///     .unwrap();
/// assert_eq!(*settings.max_models_per_batch(), 3);
/// assert_eq!(*settings.max_compare(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, derive_getters::Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct OrchestratorSettings {
    /// Upper bound on models in one dispatch
    #[builder(default = "8")]
    max_models_per_batch: usize,
    /// Upper bound on versions in one comparison
    #[builder(default = "10")]
    max_compare: usize,
    /// Backoff curve wrapped around every provider call; the retry budget
    /// comes from each model's parameters
    #[builder(default)]
    retry: RetryPolicy,
}

impl OrchestratorSettings {
    /// Creates a builder for OrchestratorSettings.
    pub fn builder() -> OrchestratorSettingsBuilder {
        OrchestratorSettingsBuilder::default()
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_models_per_batch: 8,
            max_compare: 10,
            retry: RetryPolicy::default(),
        }
    }
}
