//! Chunk routing: should a given plugin look at a given chunk?
//!
//! Cheap heuristics run first. Only when they are inconclusive does the
//! router ask the reasoning service, and every decision is cached for the
//! lifetime of the run, so repeated questions get identical answers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::analysis::retry::CallGate;
use crate::analysis::run_log::{Phase, RunLogger};
use crate::llm::prompts::{routing_schema, ROUTING_PROMPT};
use crate::llm::{LlmError, ReasoningRequest, ReasoningService};
use crate::models::{Chunk, Cost};

/// Minimum example similarity for a heuristic decision.
pub const MIN_EXAMPLE_SIMILARITY: f64 = 0.35;
/// Required lead of the best example over the best opposite-label example.
pub const MIN_EXAMPLE_MARGIN: f64 = 0.1;

/// How expensive a plugin's analysis is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    #[default]
    Low,
    High,
}

impl CostTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }

    /// Cheap plugins see ambiguous chunks; expensive ones skip them.
    pub fn default_policy(&self) -> AmbiguityPolicy {
        match self {
            Self::Low => AmbiguityPolicy::Include,
            Self::High => AmbiguityPolicy::Exclude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguityPolicy {
    Include,
    Exclude,
}

impl AmbiguityPolicy {
    pub fn includes(&self) -> bool {
        matches!(self, Self::Include)
    }
}

/// A labeled routing example supplied by a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingExample {
    pub chunk_text: String,
    pub should_process: bool,
    #[serde(default)]
    pub reason: String,
}

impl RoutingExample {
    pub fn new(chunk_text: impl Into<String>, should_process: bool, reason: impl Into<String>) -> Self {
        Self {
            chunk_text: chunk_text.into(),
            should_process,
            reason: reason.into(),
        }
    }
}

/// Everything a plugin declares about which chunks it wants.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingSpec {
    pub plugin: String,
    pub when_to_use: String,
    pub examples: Vec<RoutingExample>,
    /// Case-insensitive substrings that always route the chunk in.
    pub keywords: Vec<String>,
    pub cost_tier: CostTier,
    pub on_ambiguity: AmbiguityPolicy,
}

impl RoutingSpec {
    pub fn new(plugin: impl Into<String>, when_to_use: impl Into<String>, cost_tier: CostTier) -> Self {
        Self {
            plugin: plugin.into(),
            when_to_use: when_to_use.into(),
            examples: Vec::new(),
            keywords: Vec::new(),
            cost_tier,
            on_ambiguity: cost_tier.default_policy(),
        }
    }

    pub fn with_examples(mut self, examples: Vec<RoutingExample>) -> Self {
        self.examples = examples;
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_policy(mut self, policy: AmbiguityPolicy) -> Self {
        self.on_ambiguity = policy;
        self
    }
}

/// Where a routing decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    Heuristic,
    Classifier,
    Policy,
    /// Classification failed; included by default.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub chunk_id: String,
    pub plugin_name: String,
    pub should_process: bool,
    pub reason: String,
    pub source: DecisionSource,
}

/// Never fatal: converted into an inclusive decision.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing call failed: {0}")]
    Call(#[from] LlmError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutingReply {
    should_process: bool,
    #[serde(default)]
    reason: String,
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Pure heuristic pass. `None` means inconclusive.
pub fn heuristic_decision(chunk: &Chunk, spec: &RoutingSpec) -> Option<(bool, String)> {
    if chunk.is_blank() {
        return Some((false, "empty chunk".to_string()));
    }

    let lower = chunk.text.to_lowercase();
    if let Some(keyword) = spec
        .keywords
        .iter()
        .find(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
    {
        return Some((true, format!("matched keyword \"{}\"", keyword)));
    }

    if spec.examples.is_empty() {
        return None;
    }

    let chunk_tokens = tokens(&chunk.text);
    let mut best: Option<(f64, &RoutingExample)> = None;
    let mut best_yes = 0.0f64;
    let mut best_no = 0.0f64;
    for example in &spec.examples {
        let score = jaccard(&chunk_tokens, &tokens(&example.chunk_text));
        if example.should_process {
            best_yes = best_yes.max(score);
        } else {
            best_no = best_no.max(score);
        }
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, example));
        }
    }

    let (score, example) = best?;
    let opposite = if example.should_process { best_no } else { best_yes };
    if score >= MIN_EXAMPLE_SIMILARITY && score - opposite >= MIN_EXAMPLE_MARGIN {
        let reason = if example.reason.is_empty() {
            format!("similar to a labeled example ({:.2})", score)
        } else {
            format!("similar to a labeled example ({:.2}): {}", score, example.reason)
        };
        return Some((example.should_process, reason));
    }
    None
}

fn render_examples(examples: &[RoutingExample]) -> String {
    examples
        .iter()
        .map(|e| {
            format!(
                "- shouldProcess={} : \"{}\"{}",
                e.should_process,
                e.chunk_text.trim(),
                if e.reason.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", e.reason)
                }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run-scoped router. Create one per analysis run.
pub struct Router {
    service: Option<Arc<dyn ReasoningService>>,
    gate: CallGate,
    logger: RunLogger,
    cache: Mutex<HashMap<(String, String), RoutingDecision>>,
    costs: Mutex<HashMap<String, Cost>>,
}

impl Router {
    pub fn new(service: Option<Arc<dyn ReasoningService>>, gate: CallGate, logger: RunLogger) -> Self {
        Self {
            service,
            gate,
            logger,
            cache: Mutex::new(HashMap::new()),
            costs: Mutex::new(HashMap::new()),
        }
    }

    /// Route a chunk, reporting how the decision was reached.
    pub async fn route(&self, chunk: &Chunk, spec: &RoutingSpec) -> RoutingDecision {
        let key = (spec.plugin.clone(), chunk.id.clone());
        if let Some(cached) = self.cache.lock().await.get(&key) {
            return cached.clone();
        }

        let decision = self.decide(chunk, spec).await;
        // First decision wins if two tasks raced on the same key.
        self.cache
            .lock()
            .await
            .entry(key)
            .or_insert(decision)
            .clone()
    }

    /// Boolean form of [`Router::route`].
    pub async fn should_route(&self, chunk: &Chunk, spec: &RoutingSpec) -> bool {
        self.route(chunk, spec).await.should_process
    }

    /// Reasoning cost spent routing for `plugin` so far.
    pub async fn cost_for(&self, plugin: &str) -> Cost {
        self.costs
            .lock()
            .await
            .get(plugin)
            .copied()
            .unwrap_or_default()
    }

    async fn decide(&self, chunk: &Chunk, spec: &RoutingSpec) -> RoutingDecision {
        let decision = |should_process: bool, reason: String, source: DecisionSource| RoutingDecision {
            chunk_id: chunk.id.clone(),
            plugin_name: spec.plugin.clone(),
            should_process,
            reason,
            source,
        };

        if let Some((should_process, reason)) = heuristic_decision(chunk, spec) {
            return decision(should_process, reason, DecisionSource::Heuristic);
        }

        let Some(service) = self.service.as_deref() else {
            return decision(
                spec.on_ambiguity.includes(),
                format!("inconclusive heuristics, {} policy", spec.cost_tier.as_str()),
                DecisionSource::Policy,
            );
        };

        match self.classify(service, chunk, spec).await {
            Ok((should_process, reason)) => decision(should_process, reason, DecisionSource::Classifier),
            Err(e) => {
                self.logger.warn(
                    Some(&spec.plugin),
                    Phase::Routing,
                    format!("routing classification failed for {}, including: {}", chunk.id, e),
                );
                decision(true, format!("classification failed: {}", e), DecisionSource::Fallback)
            }
        }
    }

    async fn classify(
        &self,
        service: &dyn ReasoningService,
        chunk: &Chunk,
        spec: &RoutingSpec,
    ) -> Result<(bool, String), RoutingError> {
        let prompt = ROUTING_PROMPT
            .replace("{plugin}", &spec.plugin)
            .replace("{when_to_use}", &spec.when_to_use)
            .replace("{examples}", &render_examples(&spec.examples))
            .replace("{chunk}", &chunk.text);
        let request = ReasoningRequest::new("route", prompt)
            .with_schema(routing_schema())
            .with_max_tokens(128);

        let response = self.gate.call(service, &request).await?;
        {
            let mut costs = self.costs.lock().await;
            costs.entry(spec.plugin.clone()).or_default().merge(&Cost::single_call(
                response.usage.input_tokens,
                response.usage.output_tokens,
                response.cost_usd,
            ));
        }
        let reply: RoutingReply = response.json()?;
        Ok((reply.should_process, reply.reason))
    }
}
