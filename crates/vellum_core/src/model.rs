//! Model configuration and statistics types.

use crate::ModelId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Provider family of a configured model.
///
/// Every family except [`ProviderKind::Anthropic`] speaks the OpenAI
/// chat-completions protocol.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI
    #[serde(rename = "openai")]
    #[strum(serialize = "openai")]
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// DeepSeek
    #[serde(rename = "deepseek")]
    #[strum(serialize = "deepseek")]
    DeepSeek,
    /// Moonshot (Kimi)
    Moonshot,
    /// Zhipu GLM
    Zhipu,
    /// Alibaba Tongyi in compatible mode
    Tongyi,
    /// Local Ollama server
    Ollama,
    /// Any other endpoint implementing chat completions
    #[serde(rename = "openai_compatible")]
    #[strum(serialize = "openai_compatible")]
    OpenAiCompatible,
}

impl ProviderKind {
    /// Base URL used when the model configuration does not set one.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("https://api.openai.com/v1"),
            ProviderKind::Anthropic => Some("https://api.anthropic.com"),
            ProviderKind::DeepSeek => Some("https://api.deepseek.com/v1"),
            ProviderKind::Moonshot => Some("https://api.moonshot.cn/v1"),
            ProviderKind::Zhipu => Some("https://open.bigmodel.cn/api/paas/v4"),
            ProviderKind::Tongyi => Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
            ProviderKind::Ollama => Some("http://localhost:11434/v1"),
            ProviderKind::OpenAiCompatible => None,
        }
    }

    /// Environment variable consulted when no key is configured.
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::DeepSeek => Some("DEEPSEEK_API_KEY"),
            ProviderKind::Moonshot => Some("MOONSHOT_API_KEY"),
            ProviderKind::Zhipu => Some("ZHIPU_API_KEY"),
            ProviderKind::Tongyi => Some("DASHSCOPE_API_KEY"),
            ProviderKind::Ollama | ProviderKind::OpenAiCompatible => None,
        }
    }

    /// Whether calls to this provider must carry an API key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderKind::Ollama | ProviderKind::OpenAiCompatible)
    }
}

/// Per-call generation parameters.
///
/// # Examples
///
/// ```
/// use vellum_core::GenerationParams;
///
/// let params = GenerationParams::builder()
///     .temperature(0.2)
///     .max_retries(1u32)
///     .build()
///     .unwrap();
/// assert_eq!(*params.max_tokens(), 4000);
/// assert_eq!(params.timeout().as_secs(), 120);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_builder::Builder,
)]
#[builder(default)]
#[serde(default)]
pub struct GenerationParams {
    /// Sampling temperature
    temperature: f32,
    /// Maximum tokens to generate
    max_tokens: u32,
    /// Nucleus sampling cutoff
    top_p: f32,
    /// Per-attempt timeout in seconds
    timeout_secs: u64,
    /// Retries after the first attempt
    max_retries: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4000,
            top_p: 1.0,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

impl GenerationParams {
    /// Creates a builder for GenerationParams.
    pub fn builder() -> GenerationParamsBuilder {
        GenerationParamsBuilder::default()
    }

    /// Per-attempt timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Optional admission limits for one model.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_new::new,
)]
#[serde(default)]
pub struct ModelLimits {
    /// Requests per minute quota
    requests_per_minute: Option<u32>,
    /// Concurrent in-flight calls
    max_concurrent: Option<usize>,
}

/// Where a model's API key comes from.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Key stored inline
    pub api_key: Option<String>,
    /// Name of an environment variable holding the key
    pub api_key_env: Option<String>,
}

impl Credentials {
    /// Inline key.
    pub fn inline(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            api_key_env: None,
        }
    }

    /// Key read from an environment variable at resolution time.
    pub fn from_env(var: impl Into<String>) -> Self {
        Self {
            api_key: None,
            api_key_env: Some(var.into()),
        }
    }

    /// Resolve the key, preferring the inline value over the environment.
    pub fn resolve(&self, fallback_env: Option<&str>) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        self.api_key_env
            .as_deref()
            .or(fallback_env)
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .finish()
    }
}

/// Configuration of one generation model.
///
/// # Examples
///
/// ```
/// use vellum_core::{ModelConfig, ModelId, ProviderKind};
///
/// let config = ModelConfig::builder()
///     .id(ModelId(1))
///     .name("DeepSeek Chat")
///     .provider(ProviderKind::DeepSeek)
///     .model_name("deepseek-chat")
///     .build()
///     .unwrap();
/// assert!(*config.enabled());
/// assert_eq!(config.effective_base_url(), Some("https://api.deepseek.com/v1"));
/// ```
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters, derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct ModelConfig {
    /// Model identifier
    id: ModelId,
    /// Display name
    name: String,
    /// Provider family
    provider: ProviderKind,
    /// Provider-side model identifier
    model_name: String,
    /// Endpoint override
    #[builder(default)]
    #[serde(default)]
    base_url: Option<String>,
    /// API key source
    #[builder(default)]
    #[serde(default)]
    credentials: Credentials,
    /// Generation parameters
    #[builder(default)]
    #[serde(default)]
    params: GenerationParams,
    /// Admission limits
    #[builder(default)]
    #[serde(default)]
    limits: ModelLimits,
    /// Whether the model may be dispatched to
    #[builder(default = "true")]
    #[serde(default = "default_enabled")]
    enabled: bool,
    /// Whether this is the default model
    #[builder(default)]
    #[serde(default)]
    is_default: bool,
    /// Free-form description
    #[builder(default)]
    #[serde(default)]
    description: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl ModelConfig {
    /// Creates a builder for ModelConfig.
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder::default()
    }

    /// Configured base URL, or the provider's default.
    pub fn effective_base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .or_else(|| self.provider.default_base_url())
    }

    /// Resolve the API key from the configured credentials.
    pub fn api_key(&self) -> Option<String> {
        self.credentials
            .resolve(self.provider.default_api_key_env())
    }

    /// Replace the generation parameters.
    pub fn set_params(&mut self, params: GenerationParams) {
        self.params = params;
    }

    /// Replace the admission limits.
    pub fn set_limits(&mut self, limits: ModelLimits) {
        self.limits = limits;
    }

    /// Enable or disable the model.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Flag or unflag the model as default.
    pub fn set_default(&mut self, is_default: bool) {
        self.is_default = is_default;
    }
}

/// Snapshot of a model's running statistics.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_new::new,
)]
pub struct ModelStats {
    /// Finished attempts, successful or not
    total_calls: u64,
    /// Successful attempts
    success_calls: u64,
    /// Tokens consumed by successful attempts
    total_tokens: u64,
    /// Summed wall-clock duration in milliseconds
    total_duration_ms: u64,
}

impl ModelStats {
    /// Fraction of calls that succeeded, 0.0 when nothing has run yet.
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.success_calls as f64 / self.total_calls as f64
        }
    }

    /// Mean duration of a call in milliseconds.
    pub fn average_duration_ms(&self) -> Option<f64> {
        (self.total_calls > 0).then(|| self.total_duration_ms as f64 / self.total_calls as f64)
    }
}

/// Text returned by a provider together with its token cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct GenerationOutput {
    /// Generated text
    pub content: String,
    /// Tokens consumed by the call
    pub tokens_used: u64,
}
