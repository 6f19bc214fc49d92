//! Chunks: contiguous, offset-addressable slices of a document.

use serde::{Deserialize, Serialize};

/// Dominant structure of a chunk's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Prose,
    Heading,
    Code,
    List,
    Mixed,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prose => "prose",
            Self::Heading => "heading",
            Self::Code => "code",
            Self::List => "list",
            Self::Mixed => "mixed",
        }
    }
}

/// Descriptive data attached to a chunk by the chunker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Position of the chunk in document order.
    pub index: usize,
    /// Nearest preceding markdown heading, if any.
    pub section: Option<String>,
    pub kind: ChunkKind,
    pub word_count: usize,
}

/// A unit of analysis. Created once by the chunker, read-only thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    /// Byte offset of the first byte of `text` in the document.
    pub start_offset: usize,
    /// Byte offset one past the last byte of `text` in the document.
    pub end_offset: usize,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }

    /// Translate a chunk-local offset into a document-absolute one.
    pub fn to_absolute(&self, local: usize) -> usize {
        self.start_offset + local
    }

    /// Whether a document-absolute span lies entirely within this chunk.
    pub fn contains_span(&self, start: usize, end: usize) -> bool {
        start >= self.start_offset && end <= self.end_offset && start <= end
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
