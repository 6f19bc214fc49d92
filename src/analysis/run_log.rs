//! Per-run structured event log and execution summary.
//!
//! A [`RunLogger`] is created for each analysis run and cloned into every
//! task that belongs to the run. Events are appended to the run's own log
//! and mirrored to `tracing`, so two concurrent runs never see each other's
//! events.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::llm::format_cost;
use crate::models::{Cost, PluginStatus, RunResult};

const MAX_KEY_ISSUES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Pipeline phase an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Run,
    Classify,
    Chunk,
    Routing,
    Analyzing,
    Retry,
    LocationResolving,
    Summarizing,
    Done,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Classify => "classify",
            Self::Chunk => "chunk",
            Self::Routing => "routing",
            Self::Analyzing => "analyzing",
            Self::Retry => "retry",
            Self::LocationResolving => "location_resolving",
            Self::Summarizing => "summarizing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub plugin: Option<String>,
    pub phase: Phase,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub context: serde_json::Value,
}

/// Run-scoped event sink. Cheap to clone; clones share the same log.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: Arc<str>,
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl RunLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        let run_id: String = run_id.into();
        Self {
            run_id: Arc::from(run_id),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Append an event and mirror it to `tracing`.
    pub fn log(
        &self,
        level: LogLevel,
        plugin: Option<&str>,
        phase: Phase,
        message: impl Into<String>,
        context: serde_json::Value,
    ) {
        let message = message.into();
        let plugin_field = plugin.unwrap_or("-");
        match level {
            LogLevel::Debug => debug!(run_id = %self.run_id, plugin = plugin_field, phase = %phase, "{}", message),
            LogLevel::Info => info!(run_id = %self.run_id, plugin = plugin_field, phase = %phase, "{}", message),
            LogLevel::Warn => warn!(run_id = %self.run_id, plugin = plugin_field, phase = %phase, "{}", message),
            LogLevel::Error => error!(run_id = %self.run_id, plugin = plugin_field, phase = %phase, "{}", message),
        }

        let event = LogEvent {
            timestamp: Utc::now(),
            level,
            plugin: plugin.map(str::to_string),
            phase,
            message,
            context,
        };
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(event);
    }

    pub fn debug(&self, plugin: Option<&str>, phase: Phase, message: impl Into<String>) {
        self.log(LogLevel::Debug, plugin, phase, message, serde_json::Value::Null);
    }

    pub fn info(&self, plugin: Option<&str>, phase: Phase, message: impl Into<String>) {
        self.log(LogLevel::Info, plugin, phase, message, serde_json::Value::Null);
    }

    pub fn warn(&self, plugin: Option<&str>, phase: Phase, message: impl Into<String>) {
        self.log(LogLevel::Warn, plugin, phase, message, serde_json::Value::Null);
    }

    pub fn error(&self, plugin: Option<&str>, phase: Phase, message: impl Into<String>) {
        self.log(LogLevel::Error, plugin, phase, message, serde_json::Value::Null);
    }

    /// Snapshot of all events so far, in append order.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Derive an execution summary from a finished run.
    pub fn summarize(result: &RunResult) -> ExecutionSummary {
        let plugins: Vec<PluginSummary> = result
            .plugin_results
            .iter()
            .map(|r| {
                let mut seen = HashSet::new();
                let mut key_issues = Vec::new();
                if let Some(err) = &r.error {
                    seen.insert(err.clone());
                    key_issues.push(err.clone());
                }
                for event in result.log.iter().filter(|e| {
                    e.level >= LogLevel::Warn && e.plugin.as_deref() == Some(r.plugin_name.as_str())
                }) {
                    if key_issues.len() >= MAX_KEY_ISSUES {
                        break;
                    }
                    if seen.insert(event.message.clone()) {
                        key_issues.push(event.message.clone());
                    }
                }

                PluginSummary {
                    plugin: r.plugin_name.clone(),
                    status: r.status,
                    duration_ms: r.duration_ms,
                    cost: r.cost,
                    comment_count: r.comments.len(),
                    chunks_analyzed: r.chunks_analyzed,
                    chunks_failed: r.chunks_failed,
                    findings_dropped: r.findings_dropped,
                    retries_used: r.retries_used,
                    key_issues,
                }
            })
            .collect();

        let status = overall_status(plugins.iter().map(|p| p.status));
        let warnings = result
            .log
            .iter()
            .filter(|e| e.level == LogLevel::Warn)
            .count();
        let errors = result
            .log
            .iter()
            .filter(|e| e.level == LogLevel::Error)
            .count();

        ExecutionSummary {
            run_id: result.run_id.clone(),
            document_id: result.document_id.clone(),
            status,
            chunk_count: result.chunk_count,
            total_comments: result.highlights.len(),
            total_cost: result.total_cost,
            duration_ms: result.duration_ms,
            warnings,
            errors,
            plugins,
        }
    }
}

/// Success only if every plugin succeeded; Failed only if every plugin failed.
pub fn overall_status(statuses: impl Iterator<Item = PluginStatus>) -> PluginStatus {
    let (mut any, mut all_success, mut all_failed) = (false, true, true);
    for status in statuses {
        any = true;
        all_success &= status == PluginStatus::Success;
        all_failed &= status == PluginStatus::Failed;
    }
    if !any || all_success {
        PluginStatus::Success
    } else if all_failed {
        PluginStatus::Failed
    } else {
        PluginStatus::Partial
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSummary {
    pub plugin: String,
    pub status: PluginStatus,
    pub duration_ms: u64,
    pub cost: Cost,
    pub comment_count: usize,
    pub chunks_analyzed: usize,
    pub chunks_failed: usize,
    pub findings_dropped: usize,
    pub retries_used: u32,
    pub key_issues: Vec<String>,
}

/// Operator-facing digest of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub run_id: String,
    pub document_id: String,
    pub status: PluginStatus,
    pub chunk_count: usize,
    pub total_comments: usize,
    pub total_cost: Cost,
    pub duration_ms: u64,
    pub warnings: usize,
    pub errors: usize,
    pub plugins: Vec<PluginSummary>,
}

impl ExecutionSummary {
    /// Plain-text rendering for terminals and logs.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Run {} on {}: {} ({} chunks, {} comments, {} in {} calls, {:.1}s)",
            self.run_id,
            self.document_id,
            self.status,
            self.chunk_count,
            self.total_comments,
            format_cost(self.total_cost.usd),
            self.total_cost.calls,
            self.duration_ms as f64 / 1000.0
        );
        for p in &self.plugins {
            let _ = writeln!(
                out,
                "  {:<16} {:<8} {:>4} comments  {:>8}  {:>6}ms  retries={} dropped={}",
                p.plugin,
                p.status.as_str(),
                p.comment_count,
                format_cost(p.cost.usd),
                p.duration_ms,
                p.retries_used,
                p.findings_dropped
            );
            for issue in &p.key_issues {
                let _ = writeln!(out, "      - {}", issue);
            }
        }
        if self.warnings > 0 || self.errors > 0 {
            let _ = writeln!(out, "  {} warnings, {} errors", self.warnings, self.errors);
        }
        out
    }
}
