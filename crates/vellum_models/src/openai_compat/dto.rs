//! Data transfer objects for OpenAI-compatible APIs.

use derive_builder::Builder;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A message in the OpenAI chat format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,
    /// Message content, null for some tool-call responses
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    /// User message with text content.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
        }
    }

    /// System message with text content.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
        }
    }
}

/// OpenAI chat completion request.
#[derive(Debug, Clone, Serialize, Builder, Getters)]
#[builder(setter(into))]
pub struct ChatRequest {
    /// Model identifier
    model: String,
    /// Conversation messages
    messages: Vec<ChatMessage>,
    /// Maximum tokens to generate
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    /// Sampling temperature
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Nucleus sampling cutoff
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    /// Enable streaming
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

impl ChatRequest {
    /// Creates a new builder for ChatRequest.
    pub fn builder() -> ChatRequestBuilder {
        ChatRequestBuilder::default()
    }
}

/// A choice in the OpenAI response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// The message content
    pub message: ChatMessage,
    /// Reason for finishing
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatUsage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

/// OpenAI chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Response choices
    pub choices: Vec<ChatChoice>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}
