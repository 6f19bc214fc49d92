//! The review pipeline.
//!
//! Document → chunker → (router × plugin executor, per plugin) → location
//! resolver → orchestrator merge → run log summary.

pub mod chunker;
pub mod classifier;
pub mod executor;
pub mod location;
pub mod orchestrator;
pub mod retry;
pub mod router;
pub mod run_log;

pub use chunker::Chunker;
pub use classifier::{ClassifierConfig, DocumentProfile};
pub use executor::{ExecutorSettings, PluginExecutor, PluginRunState, ServiceCaller};
pub use location::{LocationConfig, LocationResolver};
pub use orchestrator::{
    load_document, AnalysisEvent, Orchestrator, OrchestratorError, OrchestratorSettings,
};
pub use retry::{CallGate, RetryPolicy};
pub use router::{CostTier, Router, RoutingDecision, RoutingExample, RoutingSpec};
pub use run_log::{ExecutionSummary, LogEvent, LogLevel, Phase, RunLogger};
