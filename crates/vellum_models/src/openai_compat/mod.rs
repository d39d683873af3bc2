//! Client for OpenAI-compatible chat-completions APIs.
//!
//! Used by OpenAI, DeepSeek, Moonshot, Zhipu, Tongyi compatible mode, Ollama
//! and any custom endpoint speaking the same format.

mod client;
mod conversions;
mod dto;

pub use client::OpenAiCompatibleClient;
pub use dto::{ChatChoice, ChatMessage, ChatRequest, ChatResponse, ChatUsage};
