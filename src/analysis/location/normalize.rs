//! Quote/whitespace normalization with a map back to raw offsets.

/// Normalized text plus, for every normalized byte, the raw byte span it
/// came from.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    pub text: String,
    raw_spans: Vec<(usize, usize)>,
}

impl NormalizedText {
    /// Map a normalized byte range back to the raw byte range it covers.
    pub fn raw_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start >= end || end > self.raw_spans.len() {
            return None;
        }
        Some((self.raw_spans[start].0, self.raw_spans[end - 1].1))
    }
}

fn fold_char(c: char) -> Option<&'static str> {
    Some(match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '`' | '\u{00B4}' => "'",
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}' | '\u{00BB}' => "\"",
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => "-",
        '\u{2026}' => "...",
        _ => return None,
    })
}

/// Normalize `raw`: fold typographic quotes and dashes, collapse whitespace
/// runs (NBSP included) to one space, and lowercase.
pub fn normalize(raw: &str) -> NormalizedText {
    let mut text = String::with_capacity(raw.len());
    let mut raw_spans: Vec<(usize, usize)> = Vec::with_capacity(raw.len());
    let mut in_space = false;

    let push = |text: &mut String, raw_spans: &mut Vec<(usize, usize)>, c: char, span: (usize, usize)| {
        text.push(c);
        for _ in 0..c.len_utf8() {
            raw_spans.push(span);
        }
    };

    for (i, c) in raw.char_indices() {
        let span = (i, i + c.len_utf8());
        if c.is_whitespace() {
            if in_space {
                // Widen the previous space to cover the whole run.
                if let Some(last) = raw_spans.last_mut() {
                    last.1 = span.1;
                }
            } else {
                push(&mut text, &mut raw_spans, ' ', span);
                in_space = true;
            }
            continue;
        }
        in_space = false;

        if let Some(folded) = fold_char(c) {
            for f in folded.chars() {
                push(&mut text, &mut raw_spans, f, span);
            }
            continue;
        }

        for lower in c.to_lowercase() {
            push(&mut text, &mut raw_spans, lower, span);
        }
    }

    NormalizedText { text, raw_spans }
}

/// Normalize a needle for comparison (no offset map needed).
pub fn normalize_str(raw: &str) -> String {
    normalize(raw).text.trim().to_string()
}

const WRAPPING_QUOTES: &[(char, char)] = &[
    ('"', '"'),
    ('\'', '\''),
    ('`', '`'),
    ('\u{201C}', '\u{201D}'),
    ('\u{2018}', '\u{2019}'),
    ('\u{00AB}', '\u{00BB}'),
];

/// Clean an analyzer's quote: trim, strip wrapping quotes and truncation
/// ellipses.
pub fn clean_needle(needle: &str) -> &str {
    let mut current = needle.trim();
    loop {
        let before = current;

        for (open, close) in WRAPPING_QUOTES {
            if current.chars().count() >= 2 && current.starts_with(*open) && current.ends_with(*close) {
                current = &current[open.len_utf8()..current.len() - close.len_utf8()];
                break;
            }
        }
        for marker in ["...", "\u{2026}"] {
            current = current.strip_prefix(marker).unwrap_or(current);
            current = current.strip_suffix(marker).unwrap_or(current);
        }
        current = current.trim();

        if current == before {
            return current;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folds_quotes_and_whitespace() {
        let n = normalize("He said \u{201C}Hello\u{201D},\u{00A0}\n  World");
        assert_eq!(n.text, "he said \"hello\", world");
    }

    #[test]
    fn test_raw_span_maps_back() {
        let raw = "A  \u{2018}quoted\u{2019}   word";
        let n = normalize(raw);
        let needle = "'quoted' word";
        let start = n.text.find(needle).unwrap();
        let (rs, re) = n.raw_span(start, start + needle.len()).unwrap();
        assert_eq!(&raw[rs..re], "\u{2018}quoted\u{2019}   word");
    }

    #[test]
    fn test_whitespace_run_widens_one_span() {
        let n = normalize("a \t\n b");
        assert_eq!(n.text, "a b");
        assert_eq!(n.raw_spans.len(), 3);
        assert_eq!(n.raw_span(1, 2), Some((1, 5)));
        assert_eq!(n.raw_span(0, 3), Some((0, 6)));
    }

    #[test]
    fn test_ellipsis_expands() {
        let raw = "wait\u{2026} what";
        let n = normalize(raw);
        assert_eq!(n.text, "wait... what");
        let start = n.text.find("...").unwrap();
        assert_eq!(n.raw_span(start, start + 3), Some((4, 7)));
    }

    #[test]
    fn test_clean_needle() {
        assert_eq!(clean_needle("  \"speling\"  "), "speling");
        assert_eq!(clean_needle("...the end of it"), "the end of it");
        assert_eq!(clean_needle("\u{201C}start of it\u{2026}\u{201D}"), "start of it");
        assert_eq!(clean_needle("don't"), "don't");
        assert_eq!(clean_needle("\""), "\"");
    }
}
