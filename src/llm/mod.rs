//! Reasoning service integration.
//!
//! The [`ReasoningService`] trait is the only way the analysis core talks
//! to an external model; [`LlmClient`] is the HTTP implementation.

mod client;
pub mod cost;
mod service;

pub use client::prompts;
pub use client::{parse_retry_after, LlmAppConfig, LlmClient, LlmConfig, LlmDeviceConfig, LlmProvider};
pub use cost::{calculate_cost, format_cost};
pub use service::{
    extract_json, LlmError, ReasoningRequest, ReasoningResponse, ReasoningService, Usage,
};
