//! Client for the Anthropic messages API.

use crate::anthropic::{AnthropicMessage, AnthropicRequest, AnthropicResponse};
use crate::http::{classify_status, classify_transport};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, instrument};
use vellum_core::{GenerationOutput, GenerationParams, ProviderKind};
use vellum_error::{ProviderError, ProviderErrorKind};
use vellum_interface::ProviderAdapter;

/// API version header sent with every request.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API client.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl AnthropicClient {
    /// Creates a client posting to `{base_url}/v1/messages`.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: &str) -> Self {
        let model = model.into();
        let endpoint = format!("{}/v1/messages", base_url.trim_end_matches('/'));
        debug!(model = %model, url = %endpoint, "Created Anthropic client");
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model,
            endpoint,
        }
    }

    fn build_request(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<AnthropicRequest, ProviderError> {
        AnthropicRequest::builder()
            .model(self.model.clone())
            .messages(vec![AnthropicMessage::user_text(prompt)])
            .max_tokens(*params.max_tokens())
            .temperature(Some(*params.temperature()))
            .top_p(Some(*params.top_p()))
            .build()
            .map_err(|e| {
                ProviderError::new(ProviderErrorKind::InvalidRequest(format!(
                    "Failed to build request: {}",
                    e
                )))
            })
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt, params), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        timeout: Duration,
    ) -> Result<GenerationOutput, ProviderError> {
        let request = self.build_request(prompt, params)?;

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "HTTP request failed");
                classify_transport(&e, timeout)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = %status, error = %error_text, "API error");
            return Err(classify_status(status.as_u16(), error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(&e, timeout))?;
        let parsed: AnthropicResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = ?e, "Failed to parse response");
            ProviderError::new(ProviderErrorKind::MalformedResponse(format!(
                "Failed to parse JSON: {}",
                e
            )))
        })?;

        let text = parsed.text();
        if text.trim().is_empty() {
            return Err(ProviderError::new(ProviderErrorKind::MalformedResponse(
                "No text content in response".to_string(),
            )));
        }

        debug!(
            blocks = parsed.content().len(),
            stop_reason = ?parsed.stop_reason(),
            "Received response"
        );
        Ok(GenerationOutput::new(text, parsed.total_tokens()))
    }
}
