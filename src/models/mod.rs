//! Data models for document review runs.
//!
//! Every value here is created fresh per analysis run and never shared
//! between runs.

mod chunk;
mod document;
mod finding;
mod run;

pub use chunk::{Chunk, ChunkKind, ChunkMetadata};
pub use document::Document;
pub use finding::{Ambiguity, Finding, Highlight, Importance, MatchStrategy, ResolvedLocation};
pub use run::{Cost, PluginRunResult, PluginStatus, RunResult};
