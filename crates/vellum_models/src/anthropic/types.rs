//! Anthropic API request and response types.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Anthropic API request.
#[derive(Debug, Clone, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into), pattern = "owned")]
pub struct AnthropicRequest {
    /// Model identifier
    model: String,
    /// List of messages
    messages: Vec<AnthropicMessage>,
    /// Maximum tokens to generate
    max_tokens: u32,
    /// Optional system prompt
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Optional temperature
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Optional nucleus sampling cutoff
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

impl AnthropicRequest {
    /// Creates a builder for `AnthropicRequest`.
    pub fn builder() -> AnthropicRequestBuilder {
        AnthropicRequestBuilder::default()
    }
}

/// Anthropic message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct AnthropicMessage {
    /// Role of the message sender
    role: String,
    /// Content blocks
    content: Vec<AnthropicContentBlock>,
}

impl AnthropicMessage {
    /// User turn holding a single text block.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![AnthropicContentBlock::Text { text: text.into() }],
        }
    }
}

/// Content block in an Anthropic message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    /// Text content
    Text {
        /// Text content
        text: String,
    },
}

/// Anthropic API response.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct AnthropicResponse {
    /// Response ID
    id: String,
    /// Role (should be "assistant")
    role: String,
    /// Content blocks
    content: Vec<AnthropicContent>,
    /// Model used
    model: String,
    /// Stop reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stop_reason: Option<String>,
    /// Usage information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    usage: Option<AnthropicUsage>,
}

impl AnthropicResponse {
    /// Concatenated text of every `text` block.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Input plus output tokens, 0 when usage is absent.
    pub fn total_tokens(&self) -> u64 {
        self.usage
            .as_ref()
            .map(|u| u64::from(u.input_tokens) + u64::from(u.output_tokens))
            .unwrap_or(0)
    }
}

/// Content in an Anthropic response.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct AnthropicContent {
    /// Content type, "text" for generated text
    #[serde(rename = "type")]
    content_type: String,
    /// Text content
    #[serde(default)]
    text: Option<String>,
}

/// Usage information from Anthropic API.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
pub struct AnthropicUsage {
    /// Input tokens
    input_tokens: u32,
    /// Output tokens
    output_tokens: u32,
}
