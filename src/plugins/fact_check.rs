//! Factual claim verification. Expensive, so it only sees chunks the router
//! is confident contain checkable claims.

use async_trait::async_trait;

use super::{analysis_request, parse_findings, AnalysisContext, ChunkAnalysis, Plugin, PluginError};
use crate::analysis::classifier::DocumentType;
use crate::analysis::router::{CostTier, RoutingExample};
use crate::models::{Chunk, Highlight, Importance};

const INSTRUCTIONS: &str = "You are a fact checker. Identify specific factual claims (dates, \
names, statistics, historical or scientific statements) that are false or seriously misleading. \
Explain the correct fact in the description. Do not flag opinions, predictions or claims you \
cannot assess with confidence.";

pub struct FactCheckPlugin;

impl FactCheckPlugin {
    pub fn new() -> Self {
        Self
    }

    fn instructions(doc_type: DocumentType) -> String {
        match doc_type {
            DocumentType::Fiction => format!(
                "{} This is a work of fiction: only flag real-world facts stated as true outside the story.",
                INSTRUCTIONS
            ),
            DocumentType::Academic | DocumentType::Legal => format!(
                "{} This is a {} document: hold claims to a strict standard.",
                INSTRUCTIONS, doc_type
            ),
            _ => INSTRUCTIONS.to_string(),
        }
    }
}

impl Default for FactCheckPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for FactCheckPlugin {
    fn name(&self) -> &str {
        "fact-check"
    }

    fn when_to_use(&self) -> &str {
        "Passages that state verifiable facts about the real world: dates, statistics, historical events, scientific claims, named people or places."
    }

    fn routing_examples(&self) -> Vec<RoutingExample> {
        vec![
            RoutingExample::new(
                "The Eiffel Tower was completed in 1889 and was the tallest structure in the world until 1930.",
                true,
                "dated historical claims",
            ),
            RoutingExample::new(
                "I think the new design looks much cleaner and I really enjoy using it every day.",
                false,
                "opinion",
            ),
            RoutingExample::new(
                "To install the package, run the installer and follow the prompts.",
                false,
                "instructions",
            ),
        ]
    }

    fn cost_tier(&self) -> CostTier {
        CostTier::High
    }

    fn priority(&self) -> u32 {
        30
    }

    async fn analyze_chunk(
        &self,
        chunk: &Chunk,
        ctx: &AnalysisContext<'_>,
    ) -> Result<ChunkAnalysis, PluginError> {
        let instructions = Self::instructions(ctx.profile.doc_type.label);
        let response = ctx.invoke(&analysis_request(&instructions, chunk)).await?;
        parse_findings(self.name(), &response)
    }

    fn summarize(&self, analyses: &[ChunkAnalysis], comments: &[Highlight]) -> (String, String) {
        let serious = comments
            .iter()
            .filter(|c| c.finding.importance >= Importance::High)
            .count();
        let summary = match (comments.len(), serious) {
            (0, _) => "fact-check: no false claims found".to_string(),
            (n, 0) => format!("fact-check: {} questionable claim(s)", n),
            (n, s) => format!("fact-check: {} questionable claim(s), {} serious", n, s),
        };
        let (_, analysis_text) = super::default_summary(self.name(), analyses, comments);
        (summary, analysis_text)
    }
}
