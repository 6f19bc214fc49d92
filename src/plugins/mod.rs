//! Analysis plugins.
//!
//! A plugin examines one chunk at a time and reports [`Finding`]s keyed by
//! quoted text. Routing, retries, location resolution and aggregation are
//! handled by the executor, so a plugin only decides what to ask and how to
//! read the answer.

pub mod custom;
pub mod fact_check;
pub mod math;
pub mod spelling;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::analysis::classifier::DocumentProfile;
use crate::analysis::executor::ServiceCaller;
use crate::analysis::router::{CostTier, RoutingExample, RoutingSpec};
use crate::llm::prompts::{findings_schema, ANALYSIS_PROMPT};
use crate::llm::{LlmError, ReasoningRequest, ReasoningResponse};
use crate::models::{Chunk, Document, Finding, Highlight, Importance};

pub use custom::{CustomPlugin, CustomPluginConfig};
pub use fact_check::FactCheckPlugin;
pub use math::MathPlugin;
pub use spelling::SpellingPlugin;

/// Names of the built-in plugins, in default priority order.
pub const BUILTIN_PLUGINS: &[&str] = &["spelling", "math", "fact-check"];

/// Errors from a plugin's analysis of one chunk.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("reasoning call failed: {0}")]
    Call(#[from] LlmError),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("plugin unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
}

impl PluginError {
    pub fn is_transient(&self) -> bool {
        match self {
            PluginError::Call(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// What a plugin produced for one chunk.
#[derive(Debug, Clone, Default)]
pub struct ChunkAnalysis {
    pub summary: String,
    pub findings: Vec<Finding>,
}

/// Read-only view of the run that a plugin may consult.
pub struct AnalysisContext<'a> {
    pub document: &'a Document,
    pub profile: &'a DocumentProfile,
    caller: Option<&'a ServiceCaller>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        document: &'a Document,
        profile: &'a DocumentProfile,
        caller: Option<&'a ServiceCaller>,
    ) -> Self {
        Self {
            document,
            profile,
            caller,
        }
    }

    pub fn has_service(&self) -> bool {
        self.caller.is_some()
    }

    /// Call the reasoning service with the run's retry, timeout and
    /// concurrency discipline. Cost is charged to the calling plugin.
    pub async fn invoke(&self, request: &ReasoningRequest) -> Result<ReasoningResponse, PluginError> {
        let caller = self
            .caller
            .ok_or_else(|| PluginError::Unavailable("no reasoning service configured".to_string()))?;
        Ok(caller.invoke(request).await?)
    }
}

/// The capability interface the orchestrator depends on.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Natural-language rule describing which text this plugin wants.
    fn when_to_use(&self) -> &str;

    fn routing_examples(&self) -> Vec<RoutingExample>;

    fn keywords(&self) -> Vec<String> {
        Vec::new()
    }

    fn cost_tier(&self) -> CostTier {
        CostTier::Low
    }

    /// Lower values sort first when highlights share an offset.
    fn priority(&self) -> u32 {
        100
    }

    fn routing_spec(&self) -> RoutingSpec {
        RoutingSpec::new(self.name(), self.when_to_use(), self.cost_tier())
            .with_examples(self.routing_examples())
            .with_keywords(self.keywords())
    }

    /// Analyze one routed chunk.
    async fn analyze_chunk(
        &self,
        chunk: &Chunk,
        ctx: &AnalysisContext<'_>,
    ) -> Result<ChunkAnalysis, PluginError>;

    /// Build `(summary, analysis_text)` once all chunks are done.
    fn summarize(&self, analyses: &[ChunkAnalysis], comments: &[Highlight]) -> (String, String) {
        default_summary(self.name(), analyses, comments)
    }
}

/// Summary used by plugins that do not override [`Plugin::summarize`].
pub fn default_summary(
    plugin_name: &str,
    analyses: &[ChunkAnalysis],
    comments: &[Highlight],
) -> (String, String) {
    let summary = match comments.len() {
        0 => format!("{}: no issues found", plugin_name),
        1 => format!("{}: 1 issue found", plugin_name),
        n => format!("{}: {} issues found", plugin_name, n),
    };
    let analysis_text = analyses
        .iter()
        .map(|a| a.summary.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (summary, analysis_text)
}

/// Build an analysis request around plugin instructions.
pub fn analysis_request(instructions: &str, chunk: &Chunk) -> ReasoningRequest {
    let prompt = ANALYSIS_PROMPT
        .replace("{instructions}", instructions.trim())
        .replace("{chunk}", &chunk.text);
    ReasoningRequest::new("analyze", prompt).with_schema(findings_schema())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindingsReply {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    findings: Vec<RawFinding>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFinding {
    #[serde(default, alias = "quote", alias = "text")]
    quoted_text: String,
    #[serde(default)]
    context_hint: Option<String>,
    #[serde(default, alias = "severity")]
    importance: Option<String>,
    #[serde(default, alias = "issue")]
    description: String,
}

/// Parse the shared findings schema. Findings without a quote are skipped.
pub fn parse_findings(plugin_name: &str, response: &ReasoningResponse) -> Result<ChunkAnalysis, PluginError> {
    let reply: FindingsReply = response
        .json()
        .map_err(|e| PluginError::MalformedResponse(e.to_string()))?;

    let findings = reply
        .findings
        .into_iter()
        .filter(|f| !f.quoted_text.trim().is_empty())
        .map(|f| {
            let mut finding = Finding::new(plugin_name, f.quoted_text, f.description).with_importance(
                f.importance
                    .as_deref()
                    .map(Importance::parse_lenient)
                    .unwrap_or_default(),
            );
            if let Some(hint) = f.context_hint.filter(|h| !h.trim().is_empty()) {
                finding = finding.with_context(hint);
            }
            finding
        })
        .collect();

    Ok(ChunkAnalysis {
        summary: reply.summary,
        findings,
    })
}

/// Instantiate plugins by name. Unknown names are returned as errors.
pub fn build_plugins(
    enabled: &[String],
    custom: &[CustomPluginConfig],
) -> Result<Vec<Arc<dyn Plugin>>, String> {
    let mut plugins: Vec<Arc<dyn Plugin>> = Vec::new();
    for name in enabled {
        let plugin: Arc<dyn Plugin> = match name.as_str() {
            "spelling" => Arc::new(SpellingPlugin::new()),
            "math" => Arc::new(MathPlugin::new()),
            "fact-check" => Arc::new(FactCheckPlugin::new()),
            other => match custom.iter().find(|c| c.name == other) {
                Some(config) => Arc::new(CustomPlugin::new(config.clone())),
                None => return Err(format!("unknown plugin: {}", other)),
            },
        };
        plugins.push(plugin);
    }
    Ok(plugins)
}
