//! docreview - concurrent, plugin-based document review.
//!
//! A document is split into offset-addressable chunks, routed to the
//! plugins that want them, analyzed concurrently through a shared reasoning
//! service, and every reported quote is located back in the source before
//! it becomes a [`models::Highlight`].

pub mod analysis;
pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod plugins;

pub use analysis::{Orchestrator, OrchestratorError, OrchestratorSettings};
pub use models::{Document, Highlight, RunResult};
