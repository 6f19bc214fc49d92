//! Individual location strategies.
//!
//! Each strategy works in chunk-local byte offsets and either returns a
//! verified span or `None`. Composition lives in [`super::LocationResolver`].

use crate::models::{Ambiguity, MatchStrategy};

use super::fuzzy::{best_window, span_distance};
use super::normalize::{normalize, normalize_str};

/// A match inside one haystack, in its local byte offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalMatch {
    pub start: usize,
    pub end: usize,
    pub similarity: f64,
    pub ambiguity: Option<Ambiguity>,
}

/// Per-call matching options.
#[derive(Debug, Clone, PartialEq)]
pub struct LocateOptions {
    pub fuzzy_threshold: f64,
    pub min_fuzzy_len: usize,
    pub context_window: usize,
    /// Surrounding text supplied by the analyzer.
    pub hint: Option<String>,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.8,
            min_fuzzy_len: 15,
            context_window: 200,
            hint: None,
        }
    }
}

impl LocateOptions {
    pub fn with_hint(mut self, hint: Option<&str>) -> Self {
        self.hint = hint.map(str::trim).filter(|h| !h.is_empty()).map(str::to_string);
        self
    }
}

/// One step of the fallback chain.
pub trait LocateStrategy: Send + Sync {
    fn kind(&self) -> MatchStrategy;

    fn locate(&self, needle: &str, haystack: &str, options: &LocateOptions) -> Option<LocalMatch>;
}

/// Locate the hint itself, exactly or after normalization.
pub fn find_hint(haystack: &str, hint: &str) -> Option<(usize, usize)> {
    if let Some(start) = haystack.find(hint) {
        return Some((start, start + hint.len()));
    }
    let normalized = normalize(haystack);
    let needle = normalize_str(hint);
    if needle.is_empty() {
        return None;
    }
    let start = normalized.text.find(&needle)?;
    normalized.raw_span(start, start + needle.len())
}

/// Pick among candidate spans: nearest to the hint (earlier wins ties),
/// otherwise the first. Reports the rule used when there was a choice.
pub fn choose_occurrence(
    occurrences: &[(usize, usize)],
    hint_span: Option<(usize, usize)>,
) -> Option<((usize, usize), Option<Ambiguity>)> {
    let first = *occurrences.first()?;
    let count = occurrences.len();
    if count == 1 {
        return Some((first, None));
    }

    match hint_span {
        Some(hint) => {
            // min_by_key keeps the first of equal keys.
            let nearest = occurrences
                .iter()
                .copied()
                .min_by_key(|occ| span_distance(*occ, hint))?;
            Some((nearest, Some(Ambiguity::NearestToHint { count })))
        }
        None => Some((first, Some(Ambiguity::FirstOccurrence { count }))),
    }
}

fn hint_span(haystack: &str, options: &LocateOptions) -> Option<(usize, usize)> {
    options.hint.as_deref().and_then(|h| find_hint(haystack, h))
}

/// All non-overlapping occurrences of `needle` in `haystack`.
fn occurrences(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    haystack
        .match_indices(needle)
        .map(|(i, m)| (i, i + m.len()))
        .collect()
}

/// Byte-for-byte substring match.
pub struct ExactStrategy;

impl LocateStrategy for ExactStrategy {
    fn kind(&self) -> MatchStrategy {
        MatchStrategy::Exact
    }

    fn locate(&self, needle: &str, haystack: &str, options: &LocateOptions) -> Option<LocalMatch> {
        if needle.is_empty() {
            return None;
        }
        let found = occurrences(haystack, needle);
        let ((start, end), ambiguity) = choose_occurrence(&found, hint_span(haystack, options))?;
        Some(LocalMatch {
            start,
            end,
            similarity: 1.0,
            ambiguity,
        })
    }
}

/// Match after folding quotes, dashes, whitespace and case.
pub struct NormalizedStrategy;

impl LocateStrategy for NormalizedStrategy {
    fn kind(&self) -> MatchStrategy {
        MatchStrategy::Normalized
    }

    fn locate(&self, needle: &str, haystack: &str, options: &LocateOptions) -> Option<LocalMatch> {
        let needle = normalize_str(needle);
        if needle.is_empty() {
            return None;
        }
        let normalized = normalize(haystack);
        let found: Vec<(usize, usize)> = occurrences(&normalized.text, &needle)
            .into_iter()
            .filter_map(|(s, e)| normalized.raw_span(s, e))
            .collect();
        let ((start, end), ambiguity) = choose_occurrence(&found, hint_span(haystack, options))?;
        Some(LocalMatch {
            start,
            end,
            similarity: 1.0,
            ambiguity,
        })
    }
}

/// Edit-distance match over word-aligned windows, for long enough needles.
pub struct FuzzyStrategy;

impl LocateStrategy for FuzzyStrategy {
    fn kind(&self) -> MatchStrategy {
        MatchStrategy::Fuzzy
    }

    fn locate(&self, needle: &str, haystack: &str, options: &LocateOptions) -> Option<LocalMatch> {
        let needle = normalize_str(needle);
        if needle.chars().count() < options.min_fuzzy_len {
            return None;
        }
        let normalized = normalize(haystack);
        let anchor = hint_span(haystack, options).and_then(|(s, e)| {
            // Anchor in normalized coordinates: first normalized byte at or past the hint middle.
            let mid = s + (e - s) / 2;
            (0..normalized.text.len()).find(|&i| {
                normalized
                    .raw_span(i, i + 1)
                    .is_some_and(|(rs, _)| rs >= mid)
            })
        });
        let m = best_window(&normalized.text, &needle, options.fuzzy_threshold, anchor)?;
        let (start, end) = normalized.raw_span(m.start, m.end)?;
        Some(LocalMatch {
            start,
            end,
            similarity: m.similarity,
            ambiguity: None,
        })
    }
}

/// Search near the context hint: normalized first, then fuzzily with a
/// relaxed threshold and no minimum length.
pub struct ContextStrategy;

const CONTEXT_RELAXATION: f64 = 0.1;

impl LocateStrategy for ContextStrategy {
    fn kind(&self) -> MatchStrategy {
        MatchStrategy::Context
    }

    fn locate(&self, needle: &str, haystack: &str, options: &LocateOptions) -> Option<LocalMatch> {
        let (hint_start, hint_end) = hint_span(haystack, options)?;

        let mut window_start = hint_start.saturating_sub(options.context_window);
        while !haystack.is_char_boundary(window_start) {
            window_start -= 1;
        }
        let mut window_end = (hint_end + options.context_window).min(haystack.len());
        while !haystack.is_char_boundary(window_end) {
            window_end += 1;
        }
        let window = &haystack[window_start..window_end];
        let local_hint = Some((hint_start - window_start, hint_end - window_start));

        let needle_norm = normalize_str(needle);
        if needle_norm.is_empty() {
            return None;
        }
        let normalized = normalize(window);

        let found: Vec<(usize, usize)> = occurrences(&normalized.text, &needle_norm)
            .into_iter()
            .filter_map(|(s, e)| normalized.raw_span(s, e))
            .collect();
        if let Some(((start, end), ambiguity)) = choose_occurrence(&found, local_hint) {
            return Some(LocalMatch {
                start: window_start + start,
                end: window_start + end,
                similarity: 1.0,
                ambiguity,
            });
        }

        let threshold = (options.fuzzy_threshold - CONTEXT_RELAXATION).max(0.0);
        let m = best_window(&normalized.text, &needle_norm, threshold, None)?;
        let (start, end) = normalized.raw_span(m.start, m.end)?;
        Some(LocalMatch {
            start: window_start + start,
            end: window_start + end,
            similarity: m.similarity,
            ambiguity: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> LocateOptions {
        LocateOptions::default()
    }

    #[test]
    fn test_exact_single() {
        let hay = "Calculate: 10 + 5 = 16";
        let m = ExactStrategy.locate("10 + 5 = 16", hay, &opts()).unwrap();
        assert_eq!((m.start, m.end), (11, 22));
        assert!(m.ambiguity.is_none());
    }

    #[test]
    fn test_exact_prefers_occurrence_near_hint() {
        let hay = "The teh cat sat. Later the dog ate teh bone.";
        let options = opts().with_hint(Some("ate teh bone"));
        let m = ExactStrategy.locate("teh", hay, &options).unwrap();
        assert_eq!(m.start, 35);
        assert_eq!(m.ambiguity, Some(Ambiguity::NearestToHint { count: 2 }));
    }

    #[test]
    fn test_exact_without_hint_takes_first() {
        let hay = "teh one, teh two";
        let m = ExactStrategy.locate("teh", hay, &opts()).unwrap();
        assert_eq!(m.start, 0);
        assert_eq!(m.ambiguity, Some(Ambiguity::FirstOccurrence { count: 2 }));
    }

    #[test]
    fn test_equidistant_hint_takes_earlier() {
        assert_eq!(
            choose_occurrence(&[(0, 3), (20, 23)], Some((10, 13))).map(|(s, _)| s),
            Some((0, 3))
        );
    }

    #[test]
    fn test_normalized_handles_curly_quotes_and_case() {
        let hay = "She wrote \u{201C}Hello  World\u{201D} on the board.";
        let m = NormalizedStrategy
            .locate("\"hello world\"", hay, &opts())
            .unwrap();
        assert_eq!(&hay[m.start..m.end], "\u{201C}Hello  World\u{201D}");
    }

    #[test]
    fn test_fuzzy_requires_min_length() {
        let hay = "a short bit of text";
        assert!(FuzzyStrategy.locate("short bot", hay, &opts()).is_none());
    }

    #[test]
    fn test_fuzzy_tolerates_drift() {
        let hay = "In 2019 the company reported revenues of four million dollars.";
        let m = FuzzyStrategy
            .locate("company reportd revenue of four million", hay, &opts())
            .unwrap();
        assert!(hay[m.start..m.end].starts_with("company"));
        assert!(m.similarity >= 0.8);
    }

    #[test]
    fn test_context_relaxes_threshold_near_hint() {
        let hay = "Intro text. The sistem failed twice yesterday. Outro text.";
        let options = opts().with_hint(Some("failed twice yesterday"));
        // Too short for the fuzzy strategy, but the hint narrows the search.
        assert!(FuzzyStrategy.locate("the systm", hay, &options).is_none());
        let m = ContextStrategy.locate("the systm", hay, &options).unwrap();
        assert_eq!(&hay[m.start..m.end], "The sistem");
    }

    #[test]
    fn test_context_needs_hint() {
        assert!(ContextStrategy.locate("x", "x", &opts()).is_none());
    }
}
