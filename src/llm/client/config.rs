//! Reasoning client configuration.
//!
//! Split into two tiers:
//! - `LlmAppConfig`: from the config file (generation params, timeouts)
//! - `LlmDeviceConfig`: from env vars, device-specific (provider, endpoint, model, api_key)
//!
//! Env vars: REVIEW_PROVIDER, REVIEW_MODEL, REVIEW_ENDPOINT, REVIEW_API_KEY
//! (ANTHROPIC_API_KEY, OPENAI_API_KEY and OLLAMA_HOST are used for auto-detection)

use serde::{Deserialize, Serialize};

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Ollama API (local, default)
    #[default]
    Ollama,
    /// OpenAI-compatible API (OpenAI, Groq, Together.ai, etc.)
    OpenAI,
    /// Anthropic Messages API
    Anthropic,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "groq" | "together" => Some(Self::OpenAI),
            "anthropic" | "claude" => Some(Self::Anthropic),
            _ => None,
        }
    }

    /// Whether calls run on local hardware (and are therefore free).
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Ollama)
    }
}

/// Application-level LLM config (from the config file).
/// Controls what the client asks for, not how to connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmAppConfig {
    /// Whether reasoning calls are enabled at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// HTTP-level timeout in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

/// Device-level LLM config (from env vars, varies per device).
/// Controls how to connect to the LLM backend.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmDeviceConfig {
    pub provider: LlmProvider,
    /// API endpoint (provider-specific defaults apply)
    pub endpoint: String,
    pub model: String,
    /// API key for hosted providers
    pub api_key: Option<String>,
}

/// Combined LLM configuration (runtime).
///
/// Serde: only the app config is serialized/deserialized.
/// Device config is populated from environment variables during Default.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(flatten)]
    pub app: LlmAppConfig,
    #[serde(skip)]
    pub device: LlmDeviceConfig,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2:instruct".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.1
}

fn default_http_timeout_secs() -> u64 {
    120
}

impl Default for LlmAppConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for LlmDeviceConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl LlmDeviceConfig {
    /// Create device config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve device config through an arbitrary variable lookup.
    ///
    /// Explicit REVIEW_* settings win; otherwise the provider is detected
    /// from whichever API key is present, falling back to local Ollama.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let explicit_provider = get("REVIEW_PROVIDER").and_then(|p| LlmProvider::from_str(&p));
        let explicit_endpoint = get("REVIEW_ENDPOINT");
        let explicit_model = get("REVIEW_MODEL");
        let explicit_key = get("REVIEW_API_KEY");

        let provider = explicit_provider.unwrap_or_else(|| {
            if explicit_key.is_some() || get("ANTHROPIC_API_KEY").is_some() {
                LlmProvider::Anthropic
            } else if get("OPENAI_API_KEY").is_some() {
                LlmProvider::OpenAI
            } else {
                LlmProvider::Ollama
            }
        });

        let api_key = explicit_key.or_else(|| match provider {
            LlmProvider::Anthropic => get("ANTHROPIC_API_KEY"),
            LlmProvider::OpenAI => get("OPENAI_API_KEY"),
            LlmProvider::Ollama => None,
        });

        let endpoint = explicit_endpoint.unwrap_or_else(|| match provider {
            LlmProvider::Anthropic => "https://api.anthropic.com".to_string(),
            LlmProvider::OpenAI => "https://api.openai.com".to_string(),
            LlmProvider::Ollama => get("OLLAMA_HOST").unwrap_or_else(default_endpoint),
        });

        let model = explicit_model.unwrap_or_else(|| match provider {
            LlmProvider::Anthropic => "claude-3-5-sonnet-20241022".to_string(),
            LlmProvider::OpenAI => "gpt-4o-mini".to_string(),
            LlmProvider::Ollama => default_model(),
        });

        Self {
            provider,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }

    /// Get the provider name for display.
    pub fn provider_name(&self) -> &'static str {
        match self.provider {
            LlmProvider::Ollama => "Ollama",
            LlmProvider::Anthropic => "Anthropic",
            LlmProvider::OpenAI => {
                if self.endpoint.contains("groq.com") {
                    "Groq"
                } else if self.endpoint.contains("together.xyz") {
                    "Together.ai"
                } else {
                    "OpenAI"
                }
            }
        }
    }

    /// Get a provider-aware availability hint for error messages.
    pub fn availability_hint(&self) -> String {
        match self.provider {
            LlmProvider::Ollama => format!(
                "Ollama not available at {}. Make sure Ollama is running: ollama serve",
                self.endpoint
            ),
            LlmProvider::OpenAI | LlmProvider::Anthropic if self.api_key.is_none() => format!(
                "{} API key not set. Set REVIEW_API_KEY or the provider's key variable",
                self.provider_name()
            ),
            _ => format!("{} API not available at {}", self.provider_name(), self.endpoint),
        }
    }
}

impl LlmConfig {
    pub fn new(app: LlmAppConfig, device: LlmDeviceConfig) -> Self {
        Self { app, device }
    }

    pub fn enabled(&self) -> bool {
        self.app.enabled
    }

    pub fn provider(&self) -> LlmProvider {
        self.device.provider
    }

    pub fn endpoint(&self) -> &str {
        &self.device.endpoint
    }

    pub fn model(&self) -> &str {
        &self.device.model
    }

    pub fn api_key(&self) -> Option<&str> {
        self.device.api_key.as_deref()
    }

    pub fn max_tokens(&self) -> u32 {
        self.app.max_tokens
    }

    pub fn temperature(&self) -> f32 {
        self.app.temperature
    }

    pub fn provider_name(&self) -> &'static str {
        self.device.provider_name()
    }

    pub fn availability_hint(&self) -> String {
        self.device.availability_hint()
    }

    // Setters for CLI override use cases

    pub fn set_model(&mut self, model: String) {
        self.device.model = model;
    }
}
