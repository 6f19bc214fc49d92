//! User-defined plugins.
//!
//! Custom plugins are declared in the configuration file under
//! `[[plugins.custom]]` and run the shared analysis prompt with the
//! configured instructions:
//!
//! ```toml
//! [[plugins.custom]]
//! name = "tone"
//! when_to_use = "Customer-facing prose"
//! instructions = "Flag sentences that sound rude or dismissive."
//! keywords = ["customer", "client"]
//! cost_tier = "low"
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{analysis_request, parse_findings, AnalysisContext, ChunkAnalysis, Plugin, PluginError};
use crate::analysis::router::{AmbiguityPolicy, CostTier, RoutingExample, RoutingSpec};
use crate::models::Chunk;

/// Custom plugin configuration from the config file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CustomPluginConfig {
    /// Unique plugin name; also the name used in `plugins.enabled`.
    pub name: String,
    /// Routing rule in plain language.
    pub when_to_use: String,
    /// Analysis instructions sent with every routed chunk.
    pub instructions: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub examples: Vec<RoutingExample>,
    #[serde(default)]
    pub cost_tier: CostTier,
    /// Overrides the cost tier's default handling of ambiguous chunks.
    #[serde(default)]
    pub on_ambiguity: Option<AmbiguityPolicy>,
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    100
}

impl CustomPluginConfig {
    /// Problems that make this config unusable.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("custom plugin name is empty".to_string());
        }
        if super::BUILTIN_PLUGINS.contains(&self.name.as_str()) {
            return Err(format!("custom plugin '{}' shadows a built-in plugin", self.name));
        }
        if self.instructions.trim().is_empty() {
            return Err(format!("custom plugin '{}' has no instructions", self.name));
        }
        Ok(())
    }
}

pub struct CustomPlugin {
    config: CustomPluginConfig,
}

impl CustomPlugin {
    pub fn new(config: CustomPluginConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Plugin for CustomPlugin {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn when_to_use(&self) -> &str {
        &self.config.when_to_use
    }

    fn routing_examples(&self) -> Vec<RoutingExample> {
        self.config.examples.clone()
    }

    fn keywords(&self) -> Vec<String> {
        self.config.keywords.clone()
    }

    fn cost_tier(&self) -> CostTier {
        self.config.cost_tier
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    fn routing_spec(&self) -> RoutingSpec {
        let spec = RoutingSpec::new(self.name(), self.when_to_use(), self.cost_tier())
            .with_examples(self.routing_examples())
            .with_keywords(self.keywords());
        match self.config.on_ambiguity {
            Some(policy) => spec.with_policy(policy),
            None => spec,
        }
    }

    async fn analyze_chunk(
        &self,
        chunk: &Chunk,
        ctx: &AnalysisContext<'_>,
    ) -> Result<ChunkAnalysis, PluginError> {
        let response = ctx
            .invoke(&analysis_request(&self.config.instructions, chunk))
            .await?;
        parse_findings(self.name(), &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_toml() {
        let config: CustomPluginConfig = toml::from_str(
            r#"
name = "tone"
when_to_use = "Customer-facing prose"
instructions = "Flag rude sentences."
cost_tier = "high"
on_ambiguity = "include"

[[examples]]
chunk_text = "Whatever, read the manual."
should_process = true
reason = "dismissive"
"#,
        )
        .unwrap();
        assert_eq!(config.priority, 100);
        assert_eq!(config.examples.len(), 1);
        assert!(config.validate().is_ok());

        let spec = CustomPlugin::new(config).routing_spec();
        assert_eq!(spec.cost_tier, CostTier::High);
        assert_eq!(spec.on_ambiguity, AmbiguityPolicy::Include);
    }

    #[test]
    fn test_validate_rejects_builtin_name() {
        let config = CustomPluginConfig {
            name: "math".into(),
            when_to_use: "x".into(),
            instructions: "y".into(),
            keywords: vec![],
            examples: vec![],
            cost_tier: CostTier::Low,
            on_ambiguity: None,
            priority: 1,
        };
        assert!(config.validate().unwrap_err().contains("shadows"));
    }
}
