//! Spelling and grammar review, aware of the document's spelling convention.

use async_trait::async_trait;

use super::{analysis_request, parse_findings, AnalysisContext, ChunkAnalysis, Plugin, PluginError};
use crate::analysis::classifier::Convention;
use crate::analysis::router::{CostTier, RoutingExample};
use crate::models::Chunk;

const INSTRUCTIONS: &str = "You are a careful copy editor. Find spelling mistakes, typos, \
wrong word forms and clear grammatical errors. Ignore style preferences, code, URLs and proper \
names you are unsure about.";

pub struct SpellingPlugin;

impl SpellingPlugin {
    pub fn new() -> Self {
        Self
    }

    /// Instructions with the convention rule for this document.
    pub fn instructions(convention: Convention) -> String {
        let rule = match convention {
            Convention::Us => {
                "The document uses American spelling. Flag British spellings as inconsistencies."
            }
            Convention::Uk => {
                "The document uses British spelling. Flag American spellings as inconsistencies."
            }
            Convention::Mixed => {
                "The document mixes American and British spelling. Note the mix once, then flag only outright misspellings."
            }
            Convention::Unknown => {
                "Accept both American and British spellings; flag only outright misspellings."
            }
        };
        format!("{} {}", INSTRUCTIONS, rule)
    }
}

impl Default for SpellingPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for SpellingPlugin {
    fn name(&self) -> &str {
        "spelling"
    }

    fn when_to_use(&self) -> &str {
        "Any passage of natural-language prose, headings or list items. Skip pure code and data."
    }

    fn routing_examples(&self) -> Vec<RoutingExample> {
        vec![
            RoutingExample::new(
                "The committee recieved the proposal and will review it next week.",
                true,
                "prose",
            ),
            RoutingExample::new(
                "fn main() { let x = vec![1, 2, 3]; println!(\"{:?}\", x); }",
                false,
                "source code",
            ),
        ]
    }

    fn cost_tier(&self) -> CostTier {
        CostTier::Low
    }

    fn priority(&self) -> u32 {
        10
    }

    async fn analyze_chunk(
        &self,
        chunk: &Chunk,
        ctx: &AnalysisContext<'_>,
    ) -> Result<ChunkAnalysis, PluginError> {
        let instructions = Self::instructions(ctx.profile.convention.label);
        let response = ctx.invoke(&analysis_request(&instructions, chunk)).await?;
        parse_findings(self.name(), &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instructions_follow_convention() {
        assert!(SpellingPlugin::instructions(Convention::Uk).contains("British spelling. Flag American"));
        assert!(SpellingPlugin::instructions(Convention::Unknown).contains("Accept both"));
    }
}
