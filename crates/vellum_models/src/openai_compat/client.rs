//! Generic client for OpenAI-compatible APIs.

use crate::http::{classify_status, classify_transport};
use crate::openai_compat::{ChatResponse, conversions};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, instrument};
use vellum_core::{GenerationOutput, GenerationParams, ProviderKind};
use vellum_error::{ProviderError, ProviderErrorKind};
use vellum_interface::ProviderAdapter;

/// Client for any API that follows the OpenAI chat completions format.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
    provider: ProviderKind,
}

impl std::fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleClient")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleClient {
    /// Creates a new OpenAI-compatible client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer token, omitted for keyless local servers
    /// * `model` - Model identifier
    /// * `base_url` - API root, `/chat/completions` is appended
    /// * `provider` - Provider family (for logging/tracing)
    #[instrument(skip_all, fields(provider = %provider))]
    pub fn new(
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: &str,
        provider: ProviderKind,
    ) -> Self {
        let model = model.into();
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        debug!(
            provider = %provider,
            model = %model,
            url = %endpoint,
            "Created OpenAI-compatible client"
        );

        Self {
            client: Client::new(),
            api_key,
            model,
            endpoint,
            provider,
        }
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleClient {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt, params), fields(provider = %self.provider, model = %self.model, prompt_len = prompt.len()))]
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        timeout: Duration,
    ) -> Result<GenerationOutput, ProviderError> {
        let chat_request = conversions::to_chat_request(prompt, &self.model, params)?;

        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&chat_request);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = %self.provider, error = ?e, "HTTP request failed");
            classify_transport(&e, timeout)
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                provider = %self.provider,
                status = %status,
                error = %error_text,
                "API error"
            );
            return Err(classify_status(status.as_u16(), error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(&e, timeout))?;
        let chat_response: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            error!(provider = %self.provider, error = ?e, "Failed to parse response");
            ProviderError::new(ProviderErrorKind::MalformedResponse(format!(
                "Failed to parse JSON: {}",
                e
            )))
        })?;

        debug!(
            provider = %self.provider,
            choices = chat_response.choices.len(),
            "Received response"
        );

        conversions::from_chat_response(chat_response)
    }
}
