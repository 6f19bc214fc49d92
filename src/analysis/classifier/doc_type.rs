//! Structural genre detection from weighted cues.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ClassifierConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Academic,
    Technical,
    Legal,
    Blog,
    Fiction,
    #[default]
    Unknown,
}

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [
        Self::Academic,
        Self::Technical,
        Self::Legal,
        Self::Blog,
        Self::Fiction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Academic => "academic",
            Self::Technical => "technical",
            Self::Legal => "legal",
            Self::Blog => "blog",
            Self::Fiction => "fiction",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cue that fired, with how often it fired (capped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeEvidence {
    pub cue: String,
    pub doc_type: DocumentType,
    pub count: usize,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DocumentTypeResult {
    pub label: DocumentType,
    pub confidence: f64,
    pub scores: Vec<(DocumentType, f64)>,
    pub evidence: Vec<TypeEvidence>,
}

/// Occurrences beyond this cap add nothing.
const MAX_HITS_PER_CUE: usize = 5;

struct Cue {
    name: &'static str,
    doc_type: DocumentType,
    weight: f64,
    pattern: Regex,
}

fn cue(name: &'static str, doc_type: DocumentType, weight: f64, pattern: &str) -> Cue {
    Cue {
        name,
        doc_type,
        weight,
        pattern: Regex::new(pattern).unwrap(),
    }
}

static CUES: LazyLock<Vec<Cue>> = LazyLock::new(|| {
    use DocumentType::*;
    vec![
        cue("abstract heading", Academic, 3.0, r"(?mi)^\s*(?:#+\s*)?abstract\s*:?\s*$"),
        cue("references heading", Academic, 3.0, r"(?mi)^\s*(?:#+\s*)?(?:references|bibliography|works cited)\s*$"),
        cue("et al.", Academic, 2.0, r"\bet al\."),
        cue("doi", Academic, 3.0, r"(?i)\bdoi:\s*10\.\d+|doi\.org/10\."),
        cue("numeric citation", Academic, 1.0, r"\[\d+(?:[,–-]\s*\d+)*\]"),
        cue("author-year citation", Academic, 1.0, r"\([A-Z][A-Za-z-]+(?: et al\.)?,? (?:19|20)\d{2}[a-z]?\)"),
        cue("research vocabulary", Academic, 1.0, r"(?i)\b(?:hypothes[ie]s|methodology|participants|literature review|statistically significant|empirical)\b"),
        cue("code fence", Technical, 3.0, r"(?m)^\s*(?:```|~~~)"),
        cue("shell prompt", Technical, 2.0, r"(?m)^\s*\$ \S+"),
        cue("function call", Technical, 1.0, r"\b[a-z_][a-z0-9_]*\(\)"),
        cue("technical vocabulary", Technical, 1.0, r"(?i)\b(?:api|endpoint|install(?:ation)?|configur(?:e|ation)|parameter|database|server|runtime|compile[rd]?)\b"),
        cue("version number", Technical, 1.0, r"\bv?\d+\.\d+\.\d+\b"),
        cue("whereas clause", Legal, 3.0, r"(?m)^\s*WHEREAS\b"),
        cue("section symbol", Legal, 2.0, r"§\s*\d+"),
        cue("legal phrasing", Legal, 2.0, r"(?i)\b(?:hereinafter|pursuant to|notwithstanding|heretofore|in witness whereof)\b"),
        cue("shall", Legal, 1.0, r"\bshall\b"),
        cue("legal vocabulary", Legal, 1.0, r"(?i)\b(?:plaintiff|defendant|jurisdiction|indemnif(?:y|ication)|the parties|this agreement)\b"),
        cue("first person", Blog, 1.0, r"\b(?:I|I'm|I've|my|My)\b"),
        cue("exclamation", Blog, 1.0, r"[A-Za-z]!(?:\s|$)"),
        cue("reader address", Blog, 2.0, r"(?i)\b(?:subscribe|leave a comment|let me know|thanks for reading|stay tuned)\b"),
        cue("chapter heading", Fiction, 3.0, r"(?mi)^\s*(?:#+\s*)?chapter\s+(?:\d+|[ivxlc]+|one|two|three)\b"),
        cue("dialogue attribution", Fiction, 2.0, r#"["\u{201D}],?\s+(?:she|he|I|they)\s+(?:said|asked|whispered|shouted|replied|murmured)"#),
        cue("narrative verbs", Fiction, 1.0, r"(?i)\b(?:whispered|smiled|glanced|sighed|nodded|frowned)\b"),
    ]
});

#[derive(Debug, Clone)]
pub struct DocumentTypeClassifier {
    config: ClassifierConfig,
}

impl Default for DocumentTypeClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl DocumentTypeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, text: &str) -> DocumentTypeResult {
        let mut evidence = Vec::new();
        for cue in CUES.iter() {
            let count = cue.pattern.find_iter(text).take(MAX_HITS_PER_CUE).count();
            if count > 0 {
                evidence.push(TypeEvidence {
                    cue: cue.name.to_string(),
                    doc_type: cue.doc_type,
                    count,
                    weight: cue.weight * count as f64,
                });
            }
        }

        let mut scores: Vec<(DocumentType, f64)> = DocumentType::ALL
            .iter()
            .map(|t| {
                let total = evidence
                    .iter()
                    .filter(|e| e.doc_type == *t)
                    .map(|e| e.weight)
                    .sum();
                (*t, total)
            })
            .collect();
        // Stable: equal scores keep declaration order.
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let (top_type, top) = scores[0];
        let second = scores.get(1).map(|s| s.1).unwrap_or(0.0);
        let (label, confidence) = if top < self.config.min_evidence_weight || top == second {
            (DocumentType::Unknown, 0.0)
        } else {
            (top_type, (top - second) / (top + second))
        };

        DocumentTypeResult {
            label,
            confidence,
            scores,
            evidence,
        }
    }
}
