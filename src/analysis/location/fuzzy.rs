//! Edit-distance matching over word-aligned windows.

/// Levenshtein distance over chars, two-row DP.
pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - distance / max_len`, in `[0, 1]`.
pub fn similarity(a: &[char], b: &[char]) -> f64 {
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// Best fuzzy window, in byte offsets of the searched text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatch {
    pub start: usize,
    pub end: usize,
    pub similarity: f64,
}

/// Find the window of `haystack` most similar to `needle`.
///
/// Windows start and end on word boundaries and are within ±25% of the
/// needle's length. Equal scores prefer the window nearest `anchor` (a
/// byte position), then the earliest one.
pub fn best_window(
    haystack: &str,
    needle: &str,
    threshold: f64,
    anchor: Option<usize>,
) -> Option<FuzzyMatch> {
    let needle_chars: Vec<char> = needle.chars().collect();
    if needle_chars.is_empty() {
        return None;
    }

    let indexed: Vec<(usize, char)> = haystack.char_indices().collect();
    let byte_at = |ci: usize| indexed.get(ci).map(|(b, _)| *b).unwrap_or(haystack.len());
    let chars: Vec<char> = indexed.iter().map(|(_, c)| *c).collect();

    let starts: Vec<usize> = (0..chars.len())
        .filter(|&i| !chars[i].is_whitespace() && (i == 0 || chars[i - 1].is_whitespace()))
        .collect();
    let ends: Vec<usize> = (1..=chars.len())
        .filter(|&i| !chars[i - 1].is_whitespace() && (i == chars.len() || chars[i].is_whitespace()))
        .collect();

    let n = needle_chars.len();
    let min_len = (n * 3).div_ceil(4).max(1);
    let max_len = n + n / 4;

    let mut best: Option<(FuzzyMatch, usize)> = None;

    for &s in &starts {
        let first_end = ends.partition_point(|&e| e <= s);
        for &e in &ends[first_end..] {
            let len = e - s;
            if len < min_len {
                continue;
            }
            if len > max_len {
                break;
            }
            // Length difference bounds the distance from below.
            let bound = 1.0 - len.abs_diff(n) as f64 / len.max(n) as f64;
            if bound < threshold {
                continue;
            }

            let score = similarity(&chars[s..e], &needle_chars);
            if score < threshold {
                continue;
            }

            let candidate = FuzzyMatch {
                start: byte_at(s),
                end: byte_at(e),
                similarity: score,
            };
            let distance = anchor
                .map(|a| span_distance((candidate.start, candidate.end), (a, a)))
                .unwrap_or(0);

            let better = match &best {
                None => true,
                Some((current, current_distance)) => {
                    score > current.similarity + f64::EPSILON
                        || ((score - current.similarity).abs() <= f64::EPSILON
                            && distance < *current_distance)
                }
            };
            if better {
                best = Some((candidate, distance));
            }
        }
    }

    best.map(|(m, _)| m)
}

/// Gap between two byte spans; 0 when they touch or overlap.
pub fn span_distance(a: (usize, usize), b: (usize, usize)) -> usize {
    if a.1 < b.0 {
        b.0 - a.1
    } else if b.1 < a.0 {
        a.0 - b.1
    } else {
        0
    }
}
