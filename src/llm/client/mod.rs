//! HTTP reasoning client.
//!
//! Supports Ollama for local inference plus OpenAI-compatible and Anthropic
//! hosted APIs. Every call reports token usage and its dollar cost.

mod config;
pub mod prompts;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use config::{LlmAppConfig, LlmConfig, LlmDeviceConfig, LlmProvider};

use super::cost::calculate_cost;
use super::service::{LlmError, ReasoningRequest, ReasoningResponse, ReasoningService, Usage};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Parse Retry-After header value (seconds), capped at one minute.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<u64> {
    header_value?.trim().parse::<u64>().ok().map(|secs| secs.min(60))
}

/// Reasoning client backed by an HTTP model API.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
    label: String,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// OpenAI-compatible chat completion request.
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Anthropic Messages API request.
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.app.http_timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection(format!("failed to build HTTP client: {}", e)))?;
        let label = format!("{}:{}", config.provider_name().to_lowercase(), config.model());
        Ok(Self {
            config,
            client,
            label,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Check if the reasoning service is reachable and configured.
    pub async fn is_available(&self) -> bool {
        if !self.config.enabled() {
            return false;
        }
        match self.config.provider() {
            LlmProvider::Ollama => {
                let url = format!("{}/api/tags", self.config.endpoint());
                match self.client.get(&url).send().await {
                    Ok(resp) => resp.status().is_success(),
                    Err(_) => false,
                }
            }
            LlmProvider::OpenAI | LlmProvider::Anthropic => self.config.api_key().is_some(),
        }
    }

    /// List available models.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        #[derive(Deserialize)]
        struct TagsResponse {
            models: Vec<TagInfo>,
        }
        #[derive(Deserialize)]
        struct TagInfo {
            name: String,
        }
        #[derive(Deserialize)]
        struct ModelsResponse {
            data: Vec<ModelInfo>,
        }
        #[derive(Deserialize)]
        struct ModelInfo {
            id: String,
        }

        match self.config.provider() {
            LlmProvider::Ollama => {
                let url = format!("{}/api/tags", self.config.endpoint());
                let resp = self.send(self.client.get(&url)).await?;
                let tags: TagsResponse = resp
                    .json()
                    .await
                    .map_err(|e| LlmError::Parse(e.to_string()))?;
                Ok(tags.models.into_iter().map(|m| m.name).collect())
            }
            LlmProvider::OpenAI | LlmProvider::Anthropic => {
                let url = format!("{}/v1/models", self.config.endpoint());
                let resp = self.send(self.authorize(self.client.get(&url))).await?;
                let models: ModelsResponse = resp
                    .json()
                    .await
                    .map_err(|e| LlmError::Parse(e.to_string()))?;
                Ok(models.data.into_iter().map(|m| m.id).collect())
            }
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match (self.config.provider(), self.config.api_key()) {
            (LlmProvider::Anthropic, Some(key)) => builder
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            (LlmProvider::OpenAI, Some(key)) => builder.bearer_auth(key),
            _ => builder,
        }
    }

    /// Send a request and map transport/status failures onto `LlmError`.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, LlmError> {
        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.config.app.http_timeout_secs)
            } else {
                LlmError::Connection(e.to_string())
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        if status.as_u16() == 429 {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok());
            return Err(LlmError::RateLimited {
                retry_after_secs: parse_retry_after(retry_after),
            });
        }

        let body = resp.text().await.unwrap_or_default();
        if status.as_u16() == 404 && body.to_lowercase().contains("model") {
            return Err(LlmError::ModelNotFound(self.config.model().to_string()));
        }
        Err(LlmError::Api {
            status: status.as_u16(),
            message: body,
        })
    }

    async fn call_ollama(&self, request: &ReasoningRequest) -> Result<(String, Usage), LlmError> {
        let body = OllamaRequest {
            model: self.config.model(),
            prompt: &request.prompt,
            stream: false,
            format: request.schema.clone(),
            options: OllamaOptions {
                temperature: self.config.temperature(),
                num_predict: request.max_tokens.unwrap_or(self.config.max_tokens()),
            },
        };
        let url = format!("{}/api/generate", self.config.endpoint());
        let resp = self.send(self.client.post(&url).json(&body)).await?;
        let parsed: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        Ok((
            parsed.response,
            Usage {
                input_tokens: parsed.prompt_eval_count,
                output_tokens: parsed.eval_count,
            },
        ))
    }

    async fn call_openai(&self, request: &ReasoningRequest) -> Result<(String, Usage), LlmError> {
        let body = OpenAiRequest {
            model: self.config.model(),
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: self.config.temperature(),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens()),
            response_format: request
                .schema
                .as_ref()
                .map(|_| serde_json::json!({"type": "json_object"})),
        };
        let url = format!("{}/v1/chat/completions", self.config.endpoint());
        let resp = self
            .send(self.authorize(self.client.post(&url).json(&body)))
            .await?;
        let parsed: OpenAiResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("response has no choices".to_string()))?;
        let usage = parsed
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        Ok((text, usage))
    }

    async fn call_anthropic(&self, request: &ReasoningRequest) -> Result<(String, Usage), LlmError> {
        let body = AnthropicRequest {
            model: self.config.model(),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens()),
            temperature: self.config.temperature(),
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        };
        let url = format!("{}/v1/messages", self.config.endpoint());
        let resp = self
            .send(self.authorize(self.client.post(&url).json(&body)))
            .await?;
        let parsed: AnthropicResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(LlmError::Parse("response has no text content".to_string()));
        }
        let usage = parsed
            .usage
            .map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            })
            .unwrap_or_default();
        Ok((text, usage))
    }
}

#[async_trait]
impl ReasoningService for LlmClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn invoke(&self, request: &ReasoningRequest) -> Result<ReasoningResponse, LlmError> {
        if !self.config.enabled() {
            return Err(LlmError::Disabled);
        }

        debug!(
            purpose = %request.purpose,
            provider = self.config.provider_name(),
            "Invoking reasoning service"
        );

        let (text, usage) = match self.config.provider() {
            LlmProvider::Ollama => self.call_ollama(request).await?,
            LlmProvider::OpenAI => self.call_openai(request).await?,
            LlmProvider::Anthropic => self.call_anthropic(request).await?,
        };

        let cost_usd = calculate_cost(
            self.config.model(),
            usage,
            self.config.provider().is_local(),
        );

        Ok(ReasoningResponse {
            text,
            model: self.config.model().to_string(),
            usage,
            cost_usd,
        })
    }
}
