//! Command implementations.

pub mod analyze;
pub mod chunks;
pub mod classify;
pub mod llm;
pub mod locate;
pub mod plugins;
