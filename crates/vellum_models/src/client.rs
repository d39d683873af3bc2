//! Adapter selection from model configuration.

use crate::{AnthropicClient, OpenAiCompatibleClient};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};
use vellum_core::{GenerationOutput, GenerationParams, ModelConfig, ProviderKind};
use vellum_error::{ConfigurationError, ConfigurationErrorKind, ProviderError};
use vellum_interface::ProviderAdapter;

/// Configured backend of one model.
#[derive(Debug, Clone)]
pub enum ProviderClient {
    /// Chat-completions protocol
    OpenAiCompatible(OpenAiCompatibleClient),
    /// Anthropic messages protocol
    Anthropic(AnthropicClient),
}

impl ProviderClient {
    /// Build the client for a model.
    ///
    /// Fails when no endpoint is known or a required API key is missing.
    #[instrument(skip(config), fields(model_id = %config.id(), provider = %config.provider()))]
    pub fn from_config(config: &ModelConfig) -> Result<Self, ConfigurationError> {
        let provider = *config.provider();
        let base_url = config.effective_base_url().ok_or_else(|| {
            ConfigurationError::new(ConfigurationErrorKind::Settings(format!(
                "model {} ({}) has no base_url",
                config.id(),
                provider
            )))
        })?;

        let api_key = config.api_key();
        if api_key.is_none() && provider.requires_api_key() {
            let source_hint = config
                .credentials()
                .api_key_env
                .clone()
                .or_else(|| provider.default_api_key_env().map(str::to_string))
                .unwrap_or_else(|| "api_key".to_string());
            return Err(ConfigurationError::new(
                ConfigurationErrorKind::MissingCredentials {
                    model: config.id().0,
                    source_hint,
                },
            ));
        }

        let client = match (provider, api_key) {
            (ProviderKind::Anthropic, Some(key)) => ProviderClient::Anthropic(AnthropicClient::new(
                key,
                config.model_name().clone(),
                base_url,
            )),
            (ProviderKind::Anthropic, None) => {
                return Err(ConfigurationError::new(
                    ConfigurationErrorKind::MissingCredentials {
                        model: config.id().0,
                        source_hint: "ANTHROPIC_API_KEY".to_string(),
                    },
                ));
            }
            (_, key) => ProviderClient::OpenAiCompatible(OpenAiCompatibleClient::new(
                key,
                config.model_name().clone(),
                base_url,
                provider,
            )),
        };
        debug!(base_url, "Built provider client");
        Ok(client)
    }

    fn inner(&self) -> &dyn ProviderAdapter {
        match self {
            ProviderClient::OpenAiCompatible(client) => client,
            ProviderClient::Anthropic(client) => client,
        }
    }
}

#[async_trait]
impl ProviderAdapter for ProviderClient {
    fn provider(&self) -> ProviderKind {
        self.inner().provider()
    }

    fn model_name(&self) -> &str {
        self.inner().model_name()
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        timeout: Duration,
    ) -> Result<GenerationOutput, ProviderError> {
        self.inner().generate(prompt, params, timeout).await
    }
}
