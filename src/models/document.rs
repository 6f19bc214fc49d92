//! Documents under review.
//!
//! A document is immutable once created. Every offset produced anywhere in
//! the system (chunks, resolved locations, highlights) is a UTF-8 byte
//! offset into `full_text` that always falls on a char boundary.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A document submitted for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-supplied or content-derived identifier.
    pub id: String,
    /// The complete source text.
    pub full_text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, full_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_text: full_text.into(),
        }
    }

    /// Create a document whose id is derived from its content hash.
    pub fn from_text(full_text: impl Into<String>) -> Self {
        let full_text = full_text.into();
        let id = format!("doc-{}", &Self::compute_hash(&full_text)[..12]);
        Self { id, full_text }
    }

    /// Compute SHA-256 hash of text content.
    pub fn compute_hash(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn len(&self) -> usize {
        self.full_text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.full_text.is_empty()
    }

    /// Whether the document has anything worth analyzing.
    pub fn is_blank(&self) -> bool {
        self.full_text.trim().is_empty()
    }

    /// Slice the document, returning `None` for out-of-range or
    /// non-boundary offsets instead of panicking.
    pub fn slice(&self, start: usize, end: usize) -> Option<&str> {
        self.full_text.get(start..end)
    }

    /// Convert a byte span into a Unicode scalar span, for presentation
    /// layers that count characters rather than bytes.
    pub fn char_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let prefix = self.full_text.get(..start)?;
        let inner = self.full_text.get(start..end)?;
        let char_start = prefix.chars().count();
        Some((char_start, char_start + inner.chars().count()))
    }

    /// 1-based line and column (in chars) of a byte offset.
    pub fn line_col(&self, offset: usize) -> Option<(usize, usize)> {
        let prefix = self.full_text.get(..offset)?;
        let line = prefix.matches('\n').count() + 1;
        let col = match prefix.rfind('\n') {
            Some(nl) => prefix[nl + 1..].chars().count() + 1,
            None => prefix.chars().count() + 1,
        };
        Some((line, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_is_deterministic() {
        let a = Document::from_text("Hello world");
        let b = Document::from_text("Hello world");
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("doc-"));
        assert_ne!(a.id, Document::from_text("Hello there").id);
    }

    #[test]
    fn test_slice_rejects_bad_offsets() {
        let doc = Document::new("d", "café au lait");
        assert_eq!(doc.slice(0, 3), Some("caf"));
        // 'é' is two bytes at offset 3..5
        assert!(doc.slice(0, 4).is_none());
        assert_eq!(doc.slice(0, 5), Some("café"));
        assert!(doc.slice(0, 100).is_none());
    }

    #[test]
    fn test_char_span() {
        let doc = Document::new("d", "café au lait");
        // "au" starts at byte 6, char 5
        assert_eq!(doc.char_span(6, 8), Some((5, 7)));
    }

    #[test]
    fn test_line_col() {
        let doc = Document::new("d", "first line\nsecond line");
        assert_eq!(doc.line_col(0), Some((1, 1)));
        assert_eq!(doc.line_col(11), Some((2, 1)));
        assert_eq!(doc.line_col(18), Some((2, 8)));
    }

    #[test]
    fn test_blank() {
        assert!(Document::new("d", "  \n\t ").is_blank());
        assert!(!Document::new("d", "x").is_blank());
    }
}
