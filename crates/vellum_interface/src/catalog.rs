//! Persistent model catalog.

use async_trait::async_trait;
use vellum_core::{ModelConfig, ModelId, ModelStats};
use vellum_error::VellumResult;

/// Durable storage for model configurations and their counters.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    /// Load every stored model with its persisted statistics.
    async fn load_models(&self) -> VellumResult<Vec<(ModelConfig, ModelStats)>>;

    /// Insert or replace a model configuration. Counters are left untouched.
    async fn save_model(&self, config: &ModelConfig) -> VellumResult<()>;

    /// Atomically add one finished attempt to the stored counters.
    async fn record_outcome(
        &self,
        id: ModelId,
        success: bool,
        tokens_used: u64,
        duration_ms: u64,
    ) -> VellumResult<()>;
}
