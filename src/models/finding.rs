//! Findings reported by analyzers and the verified highlights built from them.

use serde::{Deserialize, Serialize};

/// How important an analyzer considers a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Medium,
    High,
    Critical,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Lenient parse for analyzer output. Unknown labels map to `Medium`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" | "minor" | "info" | "trivial" => Self::Low,
            "high" | "major" | "important" | "error" => Self::High,
            "critical" | "severe" | "blocker" => Self::Critical,
            _ => Self::Medium,
        }
    }
}

impl Default for Importance {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unverified issue, keyed by the analyzer's approximate quote.
///
/// `quoted_text` is a best-effort copy of the offending text and is not
/// guaranteed to match the source byte-for-byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub quoted_text: String,
    pub context_hint: Option<String>,
    pub importance: Importance,
    pub description: String,
    pub plugin_name: String,
}

impl Finding {
    pub fn new(
        plugin_name: impl Into<String>,
        quoted_text: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            quoted_text: quoted_text.into(),
            context_hint: None,
            importance: Importance::default(),
            description: description.into(),
            plugin_name: plugin_name.into(),
        }
    }

    pub fn with_context(mut self, hint: impl Into<String>) -> Self {
        self.context_hint = Some(hint.into());
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }
}

/// Which resolver strategy produced a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    Normalized,
    Fuzzy,
    Context,
    Escalated,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Normalized => "normalized",
            Self::Fuzzy => "fuzzy",
            Self::Context => "context",
            Self::Escalated => "escalated",
        }
    }
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a choice between several candidate occurrences was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Ambiguity {
    /// No usable hint; the earliest occurrence was taken.
    FirstOccurrence { count: usize },
    /// The occurrence closest to the context hint was taken.
    NearestToHint { count: usize },
}

impl Ambiguity {
    pub fn count(&self) -> usize {
        match self {
            Self::FirstOccurrence { count } | Self::NearestToHint { count } => *count,
        }
    }
}

/// A verified span in document coordinates.
///
/// `quoted_text_as_found` always equals `full_text[start_offset..end_offset]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub start_offset: usize,
    pub end_offset: usize,
    pub quoted_text_as_found: String,
    pub strategy: MatchStrategy,
    /// 1.0 for exact and normalized matches, the edit similarity otherwise.
    pub similarity: f64,
    pub ambiguity: Option<Ambiguity>,
}

/// A finding whose span has been verified against the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub finding: Finding,
    pub location: ResolvedLocation,
}

impl Highlight {
    pub fn plugin_name(&self) -> &str {
        &self.finding.plugin_name
    }

    pub fn start(&self) -> usize {
        self.location.start_offset
    }

    pub fn end(&self) -> usize {
        self.location.end_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importance_parse_lenient() {
        assert_eq!(Importance::parse_lenient("HIGH"), Importance::High);
        assert_eq!(Importance::parse_lenient(" minor "), Importance::Low);
        assert_eq!(Importance::parse_lenient("severe"), Importance::Critical);
        assert_eq!(Importance::parse_lenient("whatever"), Importance::Medium);
    }

    #[test]
    fn test_importance_ordering() {
        assert!(Importance::Critical > Importance::High);
        assert!(Importance::Low < Importance::Medium);
    }

    #[test]
    fn test_ambiguity_serializes_with_rule_tag() {
        let json = serde_json::to_value(Ambiguity::NearestToHint { count: 2 }).unwrap();
        assert_eq!(json["rule"], "nearest_to_hint");
        assert_eq!(json["count"], 2);
    }
}
