//! Provider adapter trait.

use async_trait::async_trait;
use std::time::Duration;
use vellum_core::{GenerationOutput, GenerationParams, ProviderKind};
use vellum_error::ProviderError;

/// Uniform interface to one external text-generation backend.
///
/// Implementations perform a single attempt. Retries and the outer timeout
/// bound are applied by the caller.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider family of this adapter.
    fn provider(&self) -> ProviderKind;

    /// Provider-side model identifier.
    fn model_name(&self) -> &str;

    /// Generate text for a prompt.
    ///
    /// `timeout` bounds the whole HTTP exchange.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        timeout: Duration,
    ) -> Result<GenerationOutput, ProviderError>;
}
