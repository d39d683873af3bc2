//! Conversions between engine types and the OpenAI chat format.

use crate::openai_compat::{ChatMessage, ChatRequest, ChatResponse};
use vellum_core::{GenerationOutput, GenerationParams};
use vellum_error::{ProviderError, ProviderErrorKind};

/// Builds a single-turn chat request from a prompt.
pub fn to_chat_request(
    prompt: &str,
    model: &str,
    params: &GenerationParams,
) -> Result<ChatRequest, ProviderError> {
    ChatRequest::builder()
        .model(model)
        .messages(vec![ChatMessage::user(prompt)])
        .max_tokens(Some(*params.max_tokens()))
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

/// Extracts text and token usage from a chat response.
pub fn from_chat_response(response: ChatResponse) -> Result<GenerationOutput, ProviderError> {
    let tokens_used = response
        .usage
        .as_ref()
        .and_then(|u| {
            u.total_tokens.or(match (u.prompt_tokens, u.completion_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            })
        })
        .unwrap_or(0);

    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| {
            ProviderError::new(ProviderErrorKind::MalformedResponse(
                "No choices in response".to_string(),
            ))
        })?
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            ProviderError::new(ProviderErrorKind::MalformedResponse(
                "Empty message content".to_string(),
            ))
        })?;

    Ok(GenerationOutput::new(content, tokens_used))
}
