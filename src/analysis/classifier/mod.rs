//! Document property classifiers.
//!
//! Pure functions over text: no I/O and no suspension points. Both
//! classifiers share the same evidence floor so that small samples never
//! produce confident labels.

pub mod convention;
pub mod doc_type;

pub use convention::{
    Convention, ConventionClassifier, ConventionEvidence, ConventionResult, EvidenceFamily, Side,
};
pub use doc_type::{DocumentType, DocumentTypeClassifier, DocumentTypeResult, TypeEvidence};

use serde::{Deserialize, Serialize};

/// Classifier tuning, from the `[classifier]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Total weighted evidence required before any non-unknown label.
    #[serde(default = "default_min_evidence_weight")]
    pub min_evidence_weight: f64,
    /// Smaller/larger side ratio above which the label is "mixed".
    #[serde(default = "default_mixed_ratio")]
    pub mixed_ratio: f64,
}

fn default_min_evidence_weight() -> f64 {
    4.0
}

fn default_mixed_ratio() -> f64 {
    0.3
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_evidence_weight: default_min_evidence_weight(),
            mixed_ratio: default_mixed_ratio(),
        }
    }
}

/// Per-document properties, computed once per run and shared with plugins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentProfile {
    pub convention: ConventionResult,
    pub doc_type: DocumentTypeResult,
}

impl DocumentProfile {
    pub fn classify(text: &str, config: &ClassifierConfig) -> Self {
        Self {
            convention: ConventionClassifier::new(config.clone()).classify(text),
            doc_type: DocumentTypeClassifier::new(config.clone()).classify(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_of_tiny_text() {
        let profile = DocumentProfile::classify("The cat sat.", &ClassifierConfig::default());
        assert_eq!(profile.convention.label, Convention::Unknown);
        assert_eq!(profile.convention.confidence, 0.0);
        assert_eq!(profile.doc_type.label, DocumentType::Unknown);
    }

    #[test]
    fn test_config_defaults_from_partial_toml() {
        let config: ClassifierConfig = toml::from_str("mixed_ratio = 0.4").unwrap();
        assert_eq!(config.mixed_ratio, 0.4);
        assert_eq!(config.min_evidence_weight, 4.0);
    }
}
