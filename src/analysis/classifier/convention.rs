//! US vs UK spelling convention from weighted lexical evidence.
//!
//! Three families contribute evidence:
//! - strong (3): vocabulary pairs such as colour/color, centre/center
//! - medium (2): productive -ise/-ize (and -isation/-ization) forms
//! - weak (1): doubled-l inflections, -ogue/-og, marker words
//!
//! Words that are spelled the same way everywhere, or whose variants are
//! used on both sides (program, meter, check, license...), never count.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ClassifierConfig;

/// Which side a piece of evidence supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Us,
    Uk,
}

/// Final convention label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Convention {
    Us,
    Uk,
    Mixed,
    #[default]
    Unknown,
}

impl Convention {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Us => "us",
            Self::Uk => "uk",
            Self::Mixed => "mixed",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Convention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceFamily {
    Vocabulary,
    Suffix,
    Weak,
}

impl EvidenceFamily {
    pub fn weight(&self) -> f64 {
        match self {
            Self::Vocabulary => 3.0,
            Self::Suffix => 2.0,
            Self::Weak => 1.0,
        }
    }
}

/// One observed marker. Scored once, then only summed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConventionEvidence {
    pub marker: String,
    pub side: Side,
    pub family: EvidenceFamily,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConventionResult {
    pub label: Convention,
    pub confidence: f64,
    pub us_score: f64,
    pub uk_score: f64,
    pub evidence: Vec<ConventionEvidence>,
}

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]+").unwrap());

static DOUBLED_L: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(travel|cancel|label|model|fuel|signal|counsel|level|marshal|channel|dial|equal|tunnel|quarrel|rival|shovel|panel|jewel|duel|marvel)(l?)(ed|ing|er|ers)$",
    )
    .unwrap()
});

static IZE_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z]{3,})i([sz])(e|es|ed|ing|er|ers|ation|ations)$").unwrap()
});

/// (US, UK) vocabulary pairs, inflections listed explicitly.
const VOCABULARY_PAIRS: &[(&str, &str)] = &[
    ("color", "colour"),
    ("colors", "colours"),
    ("colored", "coloured"),
    ("coloring", "colouring"),
    ("colorful", "colourful"),
    ("favor", "favour"),
    ("favors", "favours"),
    ("favored", "favoured"),
    ("favorite", "favourite"),
    ("favorites", "favourites"),
    ("favorable", "favourable"),
    ("honor", "honour"),
    ("honors", "honours"),
    ("honored", "honoured"),
    ("honorable", "honourable"),
    ("labor", "labour"),
    ("labored", "laboured"),
    ("neighbor", "neighbour"),
    ("neighbors", "neighbours"),
    ("neighborhood", "neighbourhood"),
    ("behavior", "behaviour"),
    ("behaviors", "behaviours"),
    ("behavioral", "behavioural"),
    ("flavor", "flavour"),
    ("flavors", "flavours"),
    ("humor", "humour"),
    ("rumor", "rumour"),
    ("rumors", "rumours"),
    ("harbor", "harbour"),
    ("vapor", "vapour"),
    ("endeavor", "endeavour"),
    ("endeavors", "endeavours"),
    ("armor", "armour"),
    ("vigor", "vigour"),
    ("odor", "odour"),
    ("savor", "savour"),
    ("center", "centre"),
    ("centers", "centres"),
    ("centered", "centred"),
    ("theater", "theatre"),
    ("theaters", "theatres"),
    ("liter", "litre"),
    ("liters", "litres"),
    ("fiber", "fibre"),
    ("fibers", "fibres"),
    ("caliber", "calibre"),
    ("somber", "sombre"),
    ("specter", "spectre"),
    ("luster", "lustre"),
    ("meager", "meagre"),
    ("analyze", "analyse"),
    ("analyzed", "analysed"),
    ("analyzing", "analysing"),
    ("analyzer", "analyser"),
    ("paralyze", "paralyse"),
    ("paralyzed", "paralysed"),
    ("catalyze", "catalyse"),
    ("defense", "defence"),
    ("offense", "offence"),
    ("pretense", "pretence"),
    ("gray", "grey"),
    ("aluminum", "aluminium"),
    ("jewelry", "jewellery"),
    ("plow", "plough"),
    ("mold", "mould"),
    ("maneuver", "manoeuvre"),
    ("pediatric", "paediatric"),
    ("skillful", "skilful"),
    ("aging", "ageing"),
    ("mustache", "moustache"),
    ("pajamas", "pyjamas"),
    ("skeptical", "sceptical"),
    ("fulfill", "fulfil"),
    ("enroll", "enrol"),
];

/// (US, UK) -og/-ogue pairs (weak).
const OGUE_PAIRS: &[(&str, &str)] = &[
    ("catalog", "catalogue"),
    ("catalogs", "catalogues"),
    ("analog", "analogue"),
    ("monolog", "monologue"),
    ("epilog", "epilogue"),
    ("prolog", "prologue"),
    ("travelog", "travelogue"),
];

const UK_MARKERS: &[&str] = &["whilst", "amongst", "amidst", "learnt", "spelt", "dreamt"];
const US_MARKERS: &[&str] = &["gotten"];

/// Spelled the same on both sides, or with variants used on both sides.
const EXCLUDED: &[&str] = &[
    "program", "programs", "programme", "programmes", "meter", "meters", "metre", "metres",
    "check", "checks", "cheque", "cheques", "tire", "tires", "tyre", "tyres", "license", "licenses",
    "licence", "licences", "dialog", "dialogs", "dialogue", "dialogues", "practice", "practise",
    "analyses", "glamour", "judgment", "judgement", "disk", "disc", "ax", "axe", "curb", "kerb",
];

/// Lemmas whose -ise/-ize ending is not a convention marker.
const IZE_EXCLUSIONS: &[&str] = &[
    "size", "seize", "prize", "capsize", "downsize", "resize", "baize", "maize", "assize",
    "advertise", "advise", "arise", "chastise", "circumcise", "comprise", "compromise", "concise",
    "demise", "despise", "devise", "disguise", "enterprise", "excise", "exercise", "expertise",
    "franchise", "improvise", "incise", "merchandise", "noise", "otherwise", "paradise", "poise",
    "praise", "precise", "premise", "promise", "raise", "revise", "rise", "supervise", "surmise",
    "surprise", "televise", "treatise", "wise", "likewise", "clockwise", "anise", "cruise",
    "mortise", "tortoise", "porpoise", "turquoise", "bruise", "guise", "reprise", "valise",
    "apprise", "incise", "sunrise", "moonrise", "uprise", "bitwise", "pairwise", "stepwise",
    "elementwise", "coordinatewise", "appraise", "braise", "chaise", "enfranchise",
    "disenfranchise", "liaise", "louise", "denise", "elise",
];

struct Lexicon {
    words: HashMap<&'static str, (Side, EvidenceFamily)>,
    excluded: HashSet<&'static str>,
    ize_exclusions: HashSet<&'static str>,
}

static LEXICON: LazyLock<Lexicon> = LazyLock::new(|| {
    let mut words = HashMap::new();
    for (us, uk) in VOCABULARY_PAIRS {
        words.insert(*us, (Side::Us, EvidenceFamily::Vocabulary));
        words.insert(*uk, (Side::Uk, EvidenceFamily::Vocabulary));
    }
    for (us, uk) in OGUE_PAIRS {
        words.insert(*us, (Side::Us, EvidenceFamily::Weak));
        words.insert(*uk, (Side::Uk, EvidenceFamily::Weak));
    }
    for w in UK_MARKERS {
        words.insert(*w, (Side::Uk, EvidenceFamily::Weak));
    }
    for w in US_MARKERS {
        words.insert(*w, (Side::Us, EvidenceFamily::Weak));
    }
    Lexicon {
        words,
        excluded: EXCLUDED.iter().copied().collect(),
        ize_exclusions: IZE_EXCLUSIONS.iter().copied().collect(),
    }
});

/// Classify the spelling convention of `text`.
#[derive(Debug, Clone)]
pub struct ConventionClassifier {
    config: ClassifierConfig,
}

impl Default for ConventionClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl ConventionClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Collect every convention marker in `text`.
    pub fn collect_evidence(&self, text: &str) -> Vec<ConventionEvidence> {
        let lexicon = &*LEXICON;
        let mut evidence = Vec::new();

        for m in WORD.find_iter(text) {
            let word = m.as_str().to_lowercase();
            if lexicon.excluded.contains(word.as_str()) {
                continue;
            }
            if let Some((side, family)) = classify_word(lexicon, &word) {
                evidence.push(ConventionEvidence {
                    marker: word,
                    side,
                    family,
                    weight: family.weight(),
                });
            }
        }
        evidence
    }

    pub fn classify(&self, text: &str) -> ConventionResult {
        let evidence = self.collect_evidence(text);
        let (us_score, uk_score) = evidence.iter().fold((0.0, 0.0), |(us, uk), e| match e.side {
            Side::Us => (us + e.weight, uk),
            Side::Uk => (us, uk + e.weight),
        });
        let (label, confidence) = score(us_score, uk_score, &self.config);
        ConventionResult {
            label,
            confidence,
            us_score,
            uk_score,
            evidence,
        }
    }
}

fn classify_word(lexicon: &Lexicon, word: &str) -> Option<(Side, EvidenceFamily)> {
    if let Some(found) = lexicon.words.get(word) {
        return Some(*found);
    }

    if let Some(caps) = DOUBLED_L.captures(word) {
        let doubled = caps.get(2).is_some_and(|m| !m.as_str().is_empty());
        let side = if doubled { Side::Uk } else { Side::Us };
        return Some((side, EvidenceFamily::Weak));
    }

    if let Some(caps) = IZE_FORM.captures(word) {
        let stem = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let letter = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let lemma_s = format!("{}ise", stem);
        let lemma_z = format!("{}ize", stem);
        if lexicon.ize_exclusions.contains(lemma_s.as_str())
            || lexicon.ize_exclusions.contains(lemma_z.as_str())
        {
            return None;
        }
        let side = if letter == "z" { Side::Us } else { Side::Uk };
        return Some((side, EvidenceFamily::Suffix));
    }

    None
}

/// Turn side scores into a label and confidence.
///
/// Below the evidence floor the answer is always Unknown with confidence 0.
/// Comparable evidence on both sides is Mixed, with confidence equal to the
/// balance `min / max`. Otherwise confidence is `(max - min) / (a + b)`.
pub fn score(a: f64, b: f64, config: &ClassifierConfig) -> (Convention, f64) {
    let total = a + b;
    if total < config.min_evidence_weight || total <= 0.0 {
        return (Convention::Unknown, 0.0);
    }
    let (max, min) = if a >= b { (a, b) } else { (b, a) };
    if min / max > config.mixed_ratio {
        return (Convention::Mixed, min / max);
    }
    let label = if a >= b { Convention::Us } else { Convention::Uk };
    (label, (max - min) / total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> ConventionResult {
        ConventionClassifier::default().classify(text)
    }

    #[test]
    fn test_tiny_sample_is_unknown() {
        let r = classify("The cat sat.");
        assert_eq!(r.label, Convention::Unknown);
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn test_below_floor_even_if_one_sided() {
        // One strong marker (weight 3) is under the default floor of 4.
        let r = classify("My favourite dish.");
        assert_eq!(r.uk_score, 3.0);
        assert_eq!(r.label, Convention::Unknown);
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn test_clear_uk() {
        let r = classify("The colour of the centre was grey. We organised the travelling theatre.");
        assert_eq!(r.label, Convention::Uk);
        assert_eq!(r.confidence, 1.0);
        assert!(r.evidence.iter().any(|e| e.marker == "organised" && e.family == EvidenceFamily::Suffix));
        assert!(r.evidence.iter().any(|e| e.marker == "travelling" && e.family == EvidenceFamily::Weak));
    }

    #[test]
    fn test_clear_us() {
        let r = classify("The color of the center was gray, and we analyzed the organization.");
        assert_eq!(r.label, Convention::Us);
        assert!(r.us_score >= 11.0);
    }

    #[test]
    fn test_mixed() {
        let r = classify("The colour and the color. The centre and the center.");
        assert_eq!(r.label, Convention::Mixed);
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn test_minor_contamination_lowers_confidence() {
        let r = classify("colour colour colour favour honour behaviour organize");
        // UK 18, US 2: ratio 0.11 is below the mixed threshold.
        assert_eq!(r.label, Convention::Uk);
        assert!((r.confidence - 16.0 / 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_excluded_words_do_not_count() {
        let r = classify("The program checked the meter and the license, then the dialog, size and exercise.");
        assert!(r.evidence.is_empty(), "{:?}", r.evidence);
    }

    #[test]
    fn test_ize_exclusions_cover_inflections() {
        let r = classify("advertised surprising promises realised");
        assert_eq!(r.evidence.len(), 1);
        assert_eq!(r.evidence[0].marker, "realised");
    }

    #[test]
    fn test_ise_words_without_ize_variant_are_neutral() {
        let r = classify("The house was appraised, the beef braised, and the voters disenfranchised.");
        assert!(r.evidence.is_empty(), "{:?}", r.evidence);
        assert_eq!(r.label, Convention::Unknown);

        let r = classify("Louise and Denise liaised about the chaise and the enfranchised members.");
        assert!(r.evidence.is_empty(), "{:?}", r.evidence);
    }

    #[test]
    fn test_score_formula() {
        let config = ClassifierConfig::default();
        assert_eq!(score(0.0, 0.0, &config), (Convention::Unknown, 0.0));
        assert_eq!(score(6.0, 0.0, &config), (Convention::Us, 1.0));
        let (label, conf) = score(10.0, 2.0, &config);
        assert_eq!(label, Convention::Us);
        assert!((conf - 8.0 / 12.0).abs() < 1e-9);
        let (label, conf) = score(4.0, 10.0, &config);
        assert_eq!(label, Convention::Mixed);
        assert!((conf - 0.4).abs() < 1e-9);
    }
}
