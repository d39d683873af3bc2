//! LLM provider integrations for Vellum.
//!
//! Two wire protocols cover every supported provider family: the OpenAI
//! chat-completions API (OpenAI, DeepSeek, Moonshot, Zhipu, Tongyi, Ollama and
//! custom endpoints) and the Anthropic messages API. [`ProviderClient`] picks
//! the right one for a [`vellum_core::ModelConfig`].

mod anthropic;
mod client;
mod http;
mod openai_compat;
mod retry;

pub use anthropic::{
    ANTHROPIC_VERSION, AnthropicClient, AnthropicContent, AnthropicContentBlock, AnthropicMessage,
    AnthropicRequest, AnthropicResponse, AnthropicUsage,
};
pub use client::ProviderClient;
pub use http::{classify_status, classify_transport};
pub use openai_compat::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, ChatUsage, OpenAiCompatibleClient,
};
pub use retry::{RetryPolicy, generate_with_retry, retry_with_backoff};
