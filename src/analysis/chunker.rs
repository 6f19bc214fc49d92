//! Structural chunking of documents.
//!
//! Splits on blank-line paragraphs and markdown headings, keeps fenced code
//! blocks whole, and packs blocks into chunks of at most `max_chunk_chars`
//! bytes. The chunks tile the document: chunk `i` ends exactly where chunk
//! `i + 1` starts, the first starts at 0 and the last ends at the document
//! length. Whitespace between blocks belongs to the preceding chunk.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::{Chunk, ChunkKind, ChunkMetadata, Document};

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 2000;

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s{0,3}(#{1,6})\s+(.+?)\s*#*\s*$").unwrap());

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+•]|\d{1,3}[.)])\s+").unwrap());

/// A structural unit found while scanning lines.
#[derive(Debug, Clone)]
struct Block {
    start: usize,
    /// End of the block's content, excluding trailing blank lines.
    end: usize,
    kind: ChunkKind,
    heading: Option<String>,
}

/// Splits documents into ordered, addressable chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    max_chunk_chars: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_CHARS)
    }
}

impl Chunker {
    pub fn new(max_chunk_chars: usize) -> Self {
        Self {
            max_chunk_chars: max_chunk_chars.max(1),
        }
    }

    pub fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }

    /// Split a document into chunks. Deterministic for identical text.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = document.full_text.as_str();
        if text.is_empty() {
            return Vec::new();
        }

        let blocks = scan_blocks(text);
        if blocks.is_empty() {
            // Whitespace-only document: one blank chunk keeps the tiling intact.
            let mut builder = ChunkBuilder::new(text);
            builder.push(0, text.len(), &[ChunkKind::Prose], None);
            return builder.finish();
        }

        // Extend each block over the gap that follows it.
        let spans: Vec<(usize, usize, &Block)> = blocks
            .iter()
            .enumerate()
            .map(|(i, block)| {
                let start = if i == 0 { 0 } else { block.start };
                let end = blocks.get(i + 1).map(|b| b.start).unwrap_or(text.len());
                (start, end, block)
            })
            .collect();

        let max = self.max_chunk_chars;
        let mut builder = ChunkBuilder::new(text);
        let mut section: Option<String> = None;
        let mut pending: Option<(usize, usize, Vec<ChunkKind>)> = None;
        let mut pending_section: Option<String> = None;

        for (start, end, block) in spans {
            if block.kind == ChunkKind::Heading {
                if let Some((s, e, kinds)) = pending.take() {
                    builder.push(s, e, &kinds, pending_section.clone());
                }
                section = block.heading.clone();
            }

            let len = end - start;
            if len > max && block.kind != ChunkKind::Code && block.kind != ChunkKind::Heading {
                if let Some((s, e, kinds)) = pending.take() {
                    builder.push(s, e, &kinds, pending_section.clone());
                }
                for (piece_start, piece_end) in split_oversized(text, start, end, max) {
                    builder.push(piece_start, piece_end, &[block.kind], section.clone());
                }
                continue;
            }

            match pending.as_mut() {
                Some((s, e, kinds)) if *e - *s + len <= max => {
                    *e = end;
                    kinds.push(block.kind);
                }
                _ => {
                    if let Some((s, e, kinds)) = pending.take() {
                        builder.push(s, e, &kinds, pending_section.clone());
                    }
                    pending = Some((start, end, vec![block.kind]));
                    pending_section = section.clone();
                }
            }
        }

        if let Some((s, e, kinds)) = pending.take() {
            builder.push(s, e, &kinds, pending_section);
        }

        let chunks = builder.finish();
        debug!(
            document_id = %document.id,
            chunks = chunks.len(),
            max_chunk_chars = max,
            "Chunked document"
        );
        chunks
    }
}

struct ChunkBuilder<'a> {
    text: &'a str,
    chunks: Vec<Chunk>,
}

impl<'a> ChunkBuilder<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chunks: Vec::new(),
        }
    }

    fn push(&mut self, start: usize, end: usize, kinds: &[ChunkKind], section: Option<String>) {
        if start >= end {
            return;
        }
        let body = &self.text[start..end];
        let index = self.chunks.len();
        let hash = Document::compute_hash(body);
        self.chunks.push(Chunk {
            id: format!("chunk-{:04}-{}", index, &hash[..8]),
            text: body.to_string(),
            start_offset: start,
            end_offset: end,
            metadata: ChunkMetadata {
                index,
                section,
                kind: dominant_kind(kinds),
                word_count: body.split_whitespace().count(),
            },
        });
    }

    fn finish(self) -> Vec<Chunk> {
        self.chunks
    }
}

/// A heading followed by one kind of content takes that content's kind.
fn dominant_kind(kinds: &[ChunkKind]) -> ChunkKind {
    let mut body: Vec<ChunkKind> = kinds
        .iter()
        .copied()
        .filter(|k| *k != ChunkKind::Heading)
        .collect();
    body.dedup();
    match body.as_slice() {
        [] => ChunkKind::Heading,
        [only] => *only,
        [first, rest @ ..] if rest.iter().all(|k| k == first) => *first,
        _ => ChunkKind::Mixed,
    }
}

fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// Scan lines into paragraph, list, heading and code blocks.
fn scan_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut offset = 0;
    let mut paragraph: Option<(usize, usize, bool)> = None;
    let mut code: Option<(usize, usize, &'static str)> = None;

    let close_paragraph = |paragraph: &mut Option<(usize, usize, bool)>, blocks: &mut Vec<Block>| {
        if let Some((start, end, all_list)) = paragraph.take() {
            blocks.push(Block {
                start,
                end,
                kind: if all_list {
                    ChunkKind::List
                } else {
                    ChunkKind::Prose
                },
                heading: None,
            });
        }
    };

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let content = line.trim_end();
        let content_end = line_start + content.len();

        if let Some((start, _, marker)) = code {
            if content.trim_start().starts_with(marker) {
                blocks.push(Block {
                    start,
                    end: content_end,
                    kind: ChunkKind::Code,
                    heading: None,
                });
                code = None;
            } else {
                code = Some((start, content_end.max(start), marker));
            }
            continue;
        }

        if content.trim().is_empty() {
            close_paragraph(&mut paragraph, &mut blocks);
            continue;
        }

        if let Some(marker) = fence_marker(content) {
            close_paragraph(&mut paragraph, &mut blocks);
            code = Some((line_start, content_end, marker));
            continue;
        }

        if let Some(caps) = HEADING.captures(content) {
            close_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block {
                start: line_start,
                end: content_end,
                kind: ChunkKind::Heading,
                heading: caps.get(2).map(|m| m.as_str().to_string()),
            });
            continue;
        }

        let is_list = LIST_ITEM.is_match(content);
        paragraph = match paragraph {
            Some((start, _, all_list)) => Some((start, content_end, all_list && is_list)),
            None => Some((line_start, content_end, is_list)),
        };
    }

    // An unterminated fence runs to the end of the document.
    if let Some((start, end, _)) = code {
        blocks.push(Block {
            start,
            end,
            kind: ChunkKind::Code,
            heading: None,
        });
    }
    close_paragraph(&mut paragraph, &mut blocks);

    blocks.sort_by_key(|b| b.start);
    blocks
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Split `[start, end)` into pieces of roughly `max` bytes, preferring
/// sentence ends, then whitespace, then any char boundary.
fn split_oversized(text: &str, start: usize, end: usize, max: usize) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut pos = start;

    while end - pos > max {
        let limit = floor_boundary(text, pos + max);
        let window = &text[pos..limit];

        let sentence_cut = window
            .char_indices()
            .filter(|(i, c)| {
                matches!(c, '.' | '!' | '?')
                    && window[i + c.len_utf8()..]
                        .chars()
                        .next()
                        .is_some_and(char::is_whitespace)
            })
            .map(|(i, c)| pos + i + c.len_utf8())
            .last();

        let whitespace_cut = || {
            window
                .char_indices()
                .filter(|(_, c)| c.is_whitespace())
                .map(|(i, _)| pos + i)
                .filter(|&i| i > pos)
                .last()
        };

        let mut cut = match sentence_cut.or_else(whitespace_cut) {
            Some(cut) => cut,
            None if limit > pos => limit,
            None => ceil_boundary(text, pos + 1),
        };

        // Trailing whitespace stays with the piece before it.
        while cut < end {
            match text[cut..].chars().next() {
                Some(c) if c.is_whitespace() => cut += c.len_utf8(),
                _ => break,
            }
        }

        pieces.push((pos, cut));
        pos = cut;
    }

    if pos < end {
        pieces.push((pos, end));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tiles(doc: &Document, chunks: &[Chunk]) {
        assert_eq!(chunks.first().map(|c| c.start_offset), Some(0));
        assert_eq!(chunks.last().map(|c| c.end_offset), Some(doc.len()));
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_offset, pair[1].start_offset);
        }
        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, doc.full_text);
        for chunk in chunks {
            assert_eq!(&doc.full_text[chunk.start_offset..chunk.end_offset], chunk.text);
        }
    }

    #[test]
    fn test_single_paragraph() {
        let doc = Document::new("d", "Calculate: 10 + 5 = 16");
        let chunks = Chunker::default().chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Calculate: 10 + 5 = 16");
        assert_eq!(chunks[0].metadata.kind, ChunkKind::Prose);
        assert_tiles(&doc, &chunks);
    }

    #[test]
    fn test_empty_document_has_no_chunks() {
        let doc = Document::new("d", "");
        assert!(Chunker::default().chunk(&doc).is_empty());
    }

    #[test]
    fn test_whitespace_document_is_one_blank_chunk() {
        let doc = Document::new("d", "  \n\n ");
        let chunks = Chunker::default().chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_blank());
        assert_tiles(&doc, &chunks);
    }

    #[test]
    fn test_headings_start_sections() {
        let text = "Intro paragraph.\n\n# Methods\n\nWe measured things.\n\n## Results\n\nThey were good.\n";
        let doc = Document::new("d", text);
        let chunks = Chunker::new(10_000).chunk(&doc);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].metadata.section, None);
        assert_eq!(chunks[1].metadata.section.as_deref(), Some("Methods"));
        assert!(chunks[1].text.starts_with("# Methods"));
        assert_eq!(chunks[1].metadata.kind, ChunkKind::Prose);
        assert_eq!(chunks[2].metadata.section.as_deref(), Some("Results"));
        assert_tiles(&doc, &chunks);
    }

    #[test]
    fn test_paragraphs_pack_until_limit() {
        let para = "word ".repeat(10);
        let text = format!("{para}\n\n{para}\n\n{para}\n\n{para}");
        let doc = Document::new("d", text);
        let chunks = Chunker::new(110).chunk(&doc);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() <= 110));
        assert_tiles(&doc, &chunks);
    }

    #[test]
    fn test_code_fence_is_never_split() {
        let code = format!("```\n{}\n```", "let x = 1;\n".repeat(20));
        let text = format!("Before.\n\n{code}\n\nAfter.");
        let doc = Document::new("d", text);
        let chunks = Chunker::new(50).chunk(&doc);
        let code_chunk = chunks
            .iter()
            .find(|c| c.metadata.kind == ChunkKind::Code)
            .unwrap();
        assert!(code_chunk.text.starts_with("```"));
        assert!(code_chunk.text.trim_end().ends_with("```"));
        assert_tiles(&doc, &chunks);
    }

    #[test]
    fn test_blank_line_inside_fence_does_not_end_block() {
        let text = "```\nfn a() {}\n\nfn b() {}\n```\n";
        let doc = Document::new("d", text);
        let chunks = Chunker::new(10_000).chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.kind, ChunkKind::Code);
    }

    #[test]
    fn test_oversized_paragraph_splits_at_sentences() {
        let text = "First sentence here. Second sentence here. Third sentence here.";
        let doc = Document::new("d", text);
        let chunks = Chunker::new(30).chunk(&doc);
        assert_eq!(chunks[0].text, "First sentence here. ");
        assert!(chunks.len() >= 3);
        assert_tiles(&doc, &chunks);
    }

    #[test]
    fn test_oversized_without_spaces_splits_on_char_boundaries() {
        let text = "é".repeat(25);
        let doc = Document::new("d", text);
        let chunks = Chunker::new(7).chunk(&doc);
        assert!(chunks.len() > 1);
        assert_tiles(&doc, &chunks);
    }

    #[test]
    fn test_list_kind_detected() {
        let doc = Document::new("d", "- one\n- two\n- three\n");
        let chunks = Chunker::default().chunk(&doc);
        assert_eq!(chunks[0].metadata.kind, ChunkKind::List);
        assert_eq!(chunks[0].metadata.word_count, 6);
    }

    #[test]
    fn test_deterministic_ids() {
        let doc = Document::new("d", "Alpha.\n\nBeta.\n\nGamma.");
        let a = Chunker::new(8).chunk(&doc);
        let b = Chunker::new(8).chunk(&doc);
        assert_eq!(a, b);
        assert!(a[0].id.starts_with("chunk-0000-"));
        assert_eq!(a[0].id.len(), "chunk-0000-".len() + 8);
    }

    #[test]
    fn test_leading_whitespace_belongs_to_first_chunk() {
        let doc = Document::new("d", "\n\n  Hello there.\n\nBye.");
        let chunks = Chunker::new(16).chunk(&doc);
        assert_eq!(chunks[0].start_offset, 0);
        assert_tiles(&doc, &chunks);
    }
}
