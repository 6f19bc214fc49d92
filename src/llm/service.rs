//! The reasoning service seam.
//!
//! Everything that talks to an external model goes through
//! [`ReasoningService`]. The core never depends on a concrete provider,
//! which keeps plugins, routing and location escalation testable with an
//! in-process implementation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during reasoning calls.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Call timed out after {0}s")]
    Timeout(u64),
    #[error("Rate limited, retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Model not found: {0}")]
    ModelNotFound(String),
    #[error("LLM is disabled")]
    Disabled,
}

impl LlmError {
    /// Whether retrying the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Connection(_) | LlmError::Timeout(_) | LlmError::RateLimited { .. } => true,
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::Parse(_) | LlmError::ModelNotFound(_) | LlmError::Disabled => false,
        }
    }

    /// Server-suggested wait before retrying, if any.
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            LlmError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(std::time::Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A single call to the reasoning service.
#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    /// Short label for logs and metrics ("route", "analyze", "locate").
    pub purpose: String,
    pub prompt: String,
    /// JSON schema the response should follow, when structured output is wanted.
    pub schema: Option<serde_json::Value>,
    pub max_tokens: Option<u32>,
}

impl ReasoningRequest {
    pub fn new(purpose: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            prompt: prompt.into(),
            schema: None,
            max_tokens: None,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// What came back from a reasoning call.
#[derive(Debug, Clone)]
pub struct ReasoningResponse {
    pub text: String,
    pub model: String,
    pub usage: Usage,
    pub cost_usd: f64,
}

impl ReasoningResponse {
    /// Deserialize the structured part of the response.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, LlmError> {
        let raw = extract_json(&self.text)
            .ok_or_else(|| LlmError::Parse("no JSON object in response".to_string()))?;
        serde_json::from_str(raw).map_err(|e| LlmError::Parse(e.to_string()))
    }
}

/// A metered, possibly slow, possibly failing external model.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Provider/model label for logs.
    fn name(&self) -> &str;

    async fn invoke(&self, request: &ReasoningRequest) -> Result<ReasoningResponse, LlmError>;
}

/// Find the first complete JSON object or array in model output.
///
/// Models wrap JSON in markdown fences or lead with prose often enough that
/// parsing the raw text directly is unreliable.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let body = strip_code_fence(trimmed).unwrap_or(trimmed);

    let start = body.find(|c| c == '{' || c == '[')?;
    let bytes = body.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Body of a response that is itself one fenced block. Fences elsewhere
/// may sit inside JSON strings and are left alone.
fn strip_code_fence(text: &str) -> Option<&str> {
    let after_open = text.strip_prefix("```")?;
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];
    let close = body.rfind("```")?;
    Some(body[..close].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_extract_json_fenced_with_prose() {
        let text = "Here you go:\n```json\n{\"a\": {\"b\": [1, 2]}}\n```\nThanks";
        assert_eq!(extract_json(text), Some(r#"{"a": {"b": [1, 2]}}"#));
    }

    #[test]
    fn test_extract_json_fenced_only() {
        let text = "```json\n{\"n\": 1}\n```";
        assert_eq!(extract_json(text), Some(r#"{"n": 1}"#));
    }

    #[test]
    fn test_extract_json_fence_inside_string_is_kept() {
        let text = "{\n  \"quotedText\": \"wrap it in ```\",\n  \"note\": \"then close with ```\",\n  \"n\": 1\n}";
        assert_eq!(extract_json(text), Some(text));
    }

    #[test]
    fn test_extract_json_braces_inside_strings() {
        let text = r#"Result: {"quote": "a } tricky { one", "n": 2} trailing"#;
        assert_eq!(
            extract_json(text),
            Some(r#"{"quote": "a } tricky { one", "n": 2}"#)
        );
    }

    #[test]
    fn test_extract_json_none() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("{ unterminated"), None);
    }

    #[test]
    fn test_response_json() {
        #[derive(Deserialize)]
        struct Out {
            ok: bool,
        }
        let resp = ReasoningResponse {
            text: "```\n{\"ok\": true}\n```".to_string(),
            model: "m".to_string(),
            usage: Usage::default(),
            cost_usd: 0.0,
        };
        let out: Out = resp.json().unwrap();
        assert!(out.ok);
    }

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Timeout(30).is_transient());
        assert!(LlmError::RateLimited {
            retry_after_secs: None
        }
        .is_transient());
        assert!(LlmError::Api {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(!LlmError::Api {
            status: 400,
            message: String::new()
        }
        .is_transient());
        assert!(!LlmError::Parse("bad".into()).is_transient());
    }

    #[test]
    fn test_retry_after() {
        let e = LlmError::RateLimited {
            retry_after_secs: Some(7),
        };
        assert_eq!(e.retry_after(), Some(std::time::Duration::from_secs(7)));
        assert_eq!(LlmError::Timeout(1).retry_after(), None);
    }
}
