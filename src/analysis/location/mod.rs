//! Location resolution: from an approximate quote to a verified span.
//!
//! Strategies run in order and the first success wins:
//! exact, normalized, fuzzy, context. When all of them fail and the caller
//! opts in, the reasoning service is asked for the verbatim wording, and
//! whatever it returns is verified with the exact and normalized strategies
//! again. The service never supplies offsets.

mod fuzzy;
mod normalize;
mod strategies;

pub use fuzzy::{levenshtein, similarity};
pub use normalize::{clean_needle, normalize, normalize_str, NormalizedText};
pub use strategies::{
    choose_occurrence, find_hint, ContextStrategy, ExactStrategy, FuzzyStrategy, LocalMatch,
    LocateOptions, LocateStrategy, NormalizedStrategy,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::retry::CallGate;
use crate::llm::prompts::{locate_schema, LOCATE_PROMPT};
use crate::llm::{ReasoningRequest, ReasoningService};
use crate::models::{Chunk, ChunkKind, ChunkMetadata, Cost, Document, MatchStrategy, ResolvedLocation};

/// Resolver tuning, from the `[location]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_min_fuzzy_len")]
    pub min_fuzzy_len: usize,
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

fn default_fuzzy_threshold() -> f64 {
    0.8
}

fn default_min_fuzzy_len() -> usize {
    15
}

fn default_context_window() -> usize {
    200
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            min_fuzzy_len: default_min_fuzzy_len(),
            context_window: default_context_window(),
        }
    }
}

/// Service access for the escalation step.
pub struct Escalation<'a> {
    pub service: &'a dyn ReasoningService,
    pub gate: &'a CallGate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocateReply {
    #[serde(default)]
    found: bool,
    #[serde(default)]
    exact_text: Option<String>,
}

/// Ordered fallback chain of [`LocateStrategy`]s.
pub struct LocationResolver {
    strategies: Vec<Box<dyn LocateStrategy>>,
    config: LocationConfig,
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self::new(LocationConfig::default())
    }
}

impl LocationResolver {
    /// The standard chain: exact, normalized, fuzzy, context.
    pub fn new(config: LocationConfig) -> Self {
        Self::with_strategies(
            vec![
                Box::new(ExactStrategy),
                Box::new(NormalizedStrategy),
                Box::new(FuzzyStrategy),
                Box::new(ContextStrategy),
            ],
            config,
        )
    }

    pub fn with_strategies(strategies: Vec<Box<dyn LocateStrategy>>, config: LocationConfig) -> Self {
        Self { strategies, config }
    }

    pub fn config(&self) -> &LocationConfig {
        &self.config
    }

    fn options(&self, hint: Option<&str>) -> LocateOptions {
        LocateOptions {
            fuzzy_threshold: self.config.fuzzy_threshold,
            min_fuzzy_len: self.config.min_fuzzy_len,
            context_window: self.config.context_window,
            hint: None,
        }
        .with_hint(hint)
    }

    /// The raw quote (trimmed) first, then its cleaned form if different.
    fn needle_variants(needle: &str) -> Vec<&str> {
        let raw = needle.trim();
        let cleaned = clean_needle(needle);
        let mut variants = Vec::with_capacity(2);
        if !raw.is_empty() {
            variants.push(raw);
        }
        if !cleaned.is_empty() && cleaned != raw {
            variants.push(cleaned);
        }
        variants
    }

    /// Run the synchronous chain over a chunk-local haystack.
    pub fn locate_local(
        &self,
        needle: &str,
        haystack: &str,
        hint: Option<&str>,
    ) -> Option<(LocalMatch, MatchStrategy)> {
        let options = self.options(hint);
        let variants = Self::needle_variants(needle);
        for strategy in &self.strategies {
            for variant in &variants {
                if let Some(found) = strategy.locate(variant, haystack, &options) {
                    return Some((found, strategy.kind()));
                }
            }
        }
        None
    }

    /// Resolve `needle` inside `chunk`, returning document-absolute offsets.
    pub fn resolve(&self, needle: &str, chunk: &Chunk, hint: Option<&str>) -> Option<ResolvedLocation> {
        let (found, strategy) = self.locate_local(needle, &chunk.text, hint)?;
        Some(Self::to_resolved(chunk, found, strategy))
    }

    /// Resolve with the chain, then escalate to the reasoning service if
    /// allowed. Returns the location (if any) and the cost of escalation.
    pub async fn resolve_with_escalation(
        &self,
        needle: &str,
        chunk: &Chunk,
        hint: Option<&str>,
        escalation: Option<Escalation<'_>>,
    ) -> (Option<ResolvedLocation>, Cost) {
        if let Some(found) = self.resolve(needle, chunk, hint) {
            return (Some(found), Cost::default());
        }
        let Some(escalation) = escalation else {
            return (None, Cost::default());
        };

        let prompt = LOCATE_PROMPT
            .replace("{quote}", needle.trim())
            .replace(
                "{hint}",
                &hint
                    .map(|h| format!("Surrounding text: \"{}\"\n", h.trim()))
                    .unwrap_or_default(),
            )
            .replace("{chunk}", &chunk.text);
        let request = ReasoningRequest::new("locate", prompt)
            .with_schema(locate_schema())
            .with_max_tokens(256);

        let response = match escalation.gate.call(escalation.service, &request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(chunk_id = %chunk.id, error = %e, "Location escalation call failed");
                return (None, Cost::default());
            }
        };
        let cost = Cost::single_call(
            response.usage.input_tokens,
            response.usage.output_tokens,
            response.cost_usd,
        );

        let reply: LocateReply = match response.json() {
            Ok(reply) => reply,
            Err(e) => {
                debug!(chunk_id = %chunk.id, error = %e, "Unparseable location escalation reply");
                return (None, cost);
            }
        };
        let exact_text = match reply.exact_text {
            Some(text) if reply.found && !text.trim().is_empty() => text,
            _ => return (None, cost),
        };

        // Only exact or normalized confirmation counts.
        let options = self.options(hint);
        let verified = ExactStrategy
            .locate(exact_text.trim(), &chunk.text, &options)
            .or_else(|| NormalizedStrategy.locate(&exact_text, &chunk.text, &options));

        let location = verified.map(|found| Self::to_resolved(chunk, found, MatchStrategy::Escalated));
        (location, cost)
    }

    fn to_resolved(chunk: &Chunk, found: LocalMatch, strategy: MatchStrategy) -> ResolvedLocation {
        let quoted_text_as_found = chunk.text[found.start..found.end].to_string();
        ResolvedLocation {
            start_offset: chunk.to_absolute(found.start),
            end_offset: chunk.to_absolute(found.end),
            quoted_text_as_found,
            strategy,
            similarity: found.similarity,
            ambiguity: found.ambiguity,
        }
    }
}

/// A single chunk spanning the whole document, for document-level lookups.
pub fn whole_document_chunk(document: &Document) -> Chunk {
    Chunk {
        id: format!("{}-all", document.id),
        text: document.full_text.clone(),
        start_offset: 0,
        end_offset: document.len(),
        metadata: ChunkMetadata {
            index: 0,
            section: None,
            kind: ChunkKind::Mixed,
            word_count: document.full_text.split_whitespace().count(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, ReasoningResponse, Usage};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn chunk_at(start: usize, text: &str) -> Chunk {
        Chunk {
            id: "c1".to_string(),
            text: text.to_string(),
            start_offset: start,
            end_offset: start + text.len(),
            metadata: ChunkMetadata {
                index: 0,
                section: None,
                kind: ChunkKind::Prose,
                word_count: 0,
            },
        }
    }

    struct Locator(&'static str);

    #[async_trait]
    impl ReasoningService for Locator {
        fn name(&self) -> &str {
            "locator"
        }

        async fn invoke(&self, _request: &ReasoningRequest) -> Result<ReasoningResponse, LlmError> {
            Ok(ReasoningResponse {
                text: self.0.to_string(),
                model: "test".to_string(),
                usage: Usage {
                    input_tokens: 10,
                    output_tokens: 5,
                },
                cost_usd: 0.001,
            })
        }
    }

    fn gate() -> CallGate {
        CallGate::new(Arc::new(Semaphore::new(1)), Duration::from_secs(5))
    }

    #[test]
    fn test_math_example_round_trip() {
        let doc = Document::new("d", "Calculate: 10 + 5 = 16");
        let chunk = whole_document_chunk(&doc);
        let loc = LocationResolver::default()
            .resolve("10 + 5 = 16", &chunk, None)
            .unwrap();
        assert_eq!((loc.start_offset, loc.end_offset), (11, 22));
        assert_eq!(loc.quoted_text_as_found, "10 + 5 = 16");
        assert_eq!(doc.slice(loc.start_offset, loc.end_offset), Some("10 + 5 = 16"));
        assert_eq!(loc.strategy, MatchStrategy::Exact);
    }

    #[test]
    fn test_offsets_are_document_absolute() {
        let chunk = chunk_at(100, "Some text with a typo: recieve.");
        let loc = LocationResolver::default()
            .resolve("recieve", &chunk, None)
            .unwrap();
        assert_eq!(loc.start_offset, 123);
        assert_eq!(loc.end_offset, 130);
    }

    #[test]
    fn test_chain_order_and_cleanup() {
        let chunk = chunk_at(0, "He said \u{201C}it\u{2019}s fine\u{201D} and left.");
        let loc = LocationResolver::default()
            .resolve("\"it's fine...\"", &chunk, None)
            .unwrap();
        assert_eq!(loc.strategy, MatchStrategy::Normalized);
        assert_eq!(loc.quoted_text_as_found, "it\u{2019}s fine");
    }

    #[test]
    fn test_second_occurrence_with_hint() {
        let text = "The value is wrong here. Elsewhere the value is wrong again.";
        let chunk = chunk_at(0, text);
        let loc = LocationResolver::default()
            .resolve("value is wrong", &chunk, Some("the value is wrong again"))
            .unwrap();
        assert_eq!(loc.start_offset, text.rfind("value is wrong").unwrap());
        assert!(matches!(
            loc.ambiguity,
            Some(crate::models::Ambiguity::NearestToHint { count: 2 })
        ));
    }

    #[test]
    fn test_unresolvable_returns_none() {
        let chunk = chunk_at(0, "Nothing to see here.");
        assert!(LocationResolver::default()
            .resolve("completely absent phrase", &chunk, None)
            .is_none());
    }

    #[tokio::test]
    async fn test_escalation_is_verified() {
        let chunk = chunk_at(50, "Revenue grew by 12 percent in Q3.");
        let resolver = LocationResolver::default();
        let service = Locator(r#"{"found": true, "exactText": "grew by 12 percent"}"#);
        let gate = gate();
        let (loc, cost) = resolver
            .resolve_with_escalation(
                "growth of twelve pct",
                &chunk,
                None,
                Some(Escalation {
                    service: &service,
                    gate: &gate,
                }),
            )
            .await;
        let loc = loc.unwrap();
        assert_eq!(loc.strategy, MatchStrategy::Escalated);
        assert_eq!(loc.quoted_text_as_found, "grew by 12 percent");
        assert_eq!(loc.start_offset, 58);
        assert_eq!(cost.calls, 1);
    }

    #[tokio::test]
    async fn test_escalation_hallucination_rejected() {
        let chunk = chunk_at(0, "Revenue grew by 12 percent in Q3.");
        let service = Locator(r#"{"found": true, "exactText": "fell sharply"}"#);
        let gate = gate();
        let (loc, cost) = LocationResolver::default()
            .resolve_with_escalation(
                "growth of twelve pct",
                &chunk,
                None,
                Some(Escalation {
                    service: &service,
                    gate: &gate,
                }),
            )
            .await;
        assert!(loc.is_none());
        assert_eq!(cost.calls, 1);
    }

    #[tokio::test]
    async fn test_no_escalation_without_opt_in() {
        let chunk = chunk_at(0, "Revenue grew by 12 percent in Q3.");
        let (loc, cost) = LocationResolver::default()
            .resolve_with_escalation("growth of twelve pct", &chunk, None, None)
            .await;
        assert!(loc.is_none());
        assert_eq!(cost.calls, 0);
    }
}
