//! Per-plugin and per-document run results.

use serde::{Deserialize, Serialize};

use crate::analysis::classifier::DocumentProfile;
use crate::analysis::run_log::LogEvent;

use super::Highlight;

/// Token and dollar cost accumulated over one or more reasoning calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    pub calls: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub usd: f64,
}

impl Cost {
    pub fn single_call(input_tokens: u64, output_tokens: u64, usd: f64) -> Self {
        Self {
            calls: 1,
            input_tokens,
            output_tokens,
            usd,
        }
    }

    pub fn merge(&mut self, other: &Cost) {
        self.calls += other.calls;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.usd += other.usd;
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl std::iter::Sum for Cost {
    fn sum<I: Iterator<Item = Cost>>(iter: I) -> Self {
        iter.fold(Cost::default(), |mut acc, c| {
            acc.merge(&c);
            acc
        })
    }
}

/// Outcome of one plugin over one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    /// Every eligible chunk was analyzed (including the case of none).
    Success,
    /// Some chunks failed, some succeeded.
    Partial,
    /// Nothing could be analyzed.
    Failed,
}

impl PluginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    /// Derive status from chunk outcome counts.
    pub fn from_counts(analyzed: usize, failed: usize) -> Self {
        match (analyzed, failed) {
            (_, 0) => Self::Success,
            (0, _) => Self::Failed,
            _ => Self::Partial,
        }
    }
}

impl std::fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running one plugin over one document. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRunResult {
    pub plugin_name: String,
    pub summary: String,
    pub analysis_text: String,
    pub comments: Vec<Highlight>,
    pub cost: Cost,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub status: PluginStatus,
    /// Chunks the router sent to this plugin.
    pub chunks_routed: usize,
    pub chunks_analyzed: usize,
    pub chunks_failed: usize,
    /// Findings dropped because their location could not be verified.
    pub findings_dropped: usize,
    pub retries_used: u32,
}

impl PluginRunResult {
    /// A result for a plugin that could not run at all.
    pub fn failed(plugin_name: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            summary: String::new(),
            analysis_text: String::new(),
            comments: Vec::new(),
            cost: Cost::default(),
            duration_ms,
            error: Some(error.into()),
            status: PluginStatus::Failed,
            chunks_routed: 0,
            chunks_analyzed: 0,
            chunks_failed: 0,
            findings_dropped: 0,
            retries_used: 0,
        }
    }
}

/// Everything a caller gets back from one `analyze` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub document_id: String,
    pub profile: DocumentProfile,
    pub plugin_results: Vec<PluginRunResult>,
    /// All highlights from all plugins, ordered by document offset and then
    /// by plugin priority.
    pub highlights: Vec<Highlight>,
    pub chunk_count: usize,
    pub total_cost: Cost,
    pub duration_ms: u64,
    pub log: Vec<LogEvent>,
}

impl RunResult {
    pub fn status_of(&self, plugin_name: &str) -> Option<PluginStatus> {
        self.plugin_results
            .iter()
            .find(|r| r.plugin_name == plugin_name)
            .map(|r| r.status)
    }

    pub fn result_for(&self, plugin_name: &str) -> Option<&PluginRunResult> {
        self.plugin_results
            .iter()
            .find(|r| r.plugin_name == plugin_name)
    }

    pub fn highlights_for<'a>(&'a self, plugin_name: &'a str) -> impl Iterator<Item = &'a Highlight> {
        self.highlights
            .iter()
            .filter(move |h| h.plugin_name() == plugin_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_counts() {
        assert_eq!(PluginStatus::from_counts(0, 0), PluginStatus::Success);
        assert_eq!(PluginStatus::from_counts(3, 0), PluginStatus::Success);
        assert_eq!(PluginStatus::from_counts(2, 1), PluginStatus::Partial);
        assert_eq!(PluginStatus::from_counts(0, 4), PluginStatus::Failed);
    }

    #[test]
    fn test_cost_sum() {
        let total: Cost = vec![
            Cost::single_call(100, 20, 0.01),
            Cost::single_call(50, 10, 0.005),
        ]
        .into_iter()
        .sum();
        assert_eq!(total.calls, 2);
        assert_eq!(total.input_tokens, 150);
        assert_eq!(total.total_tokens(), 180);
        assert!((total.usd - 0.015).abs() < 1e-12);
    }
}
