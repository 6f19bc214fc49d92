//! Runs one plugin over one document.
//!
//! A plugin run walks a fixed state machine:
//! `NotStarted -> Routing -> Analyzing -> LocationResolving -> Summarizing -> Done`,
//! with `Failed` reachable from any non-terminal state. Chunks are analyzed
//! independently; a failing chunk is recorded and the rest carry on.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::join_all;
use futures::FutureExt;
use serde_json::json;
use tokio::sync::mpsc;

use crate::analysis::classifier::DocumentProfile;
use crate::analysis::location::{Escalation, LocationResolver};
use crate::analysis::orchestrator::AnalysisEvent;
use crate::analysis::retry::{CallGate, RetryPolicy};
use crate::analysis::router::Router;
use crate::analysis::run_log::{LogLevel, Phase, RunLogger};
use crate::llm::{LlmError, ReasoningRequest, ReasoningResponse, ReasoningService};
use crate::models::{
    Chunk, Cost, Document, Finding, Highlight, PluginRunResult, PluginStatus, ResolvedLocation,
};
use crate::plugins::{AnalysisContext, ChunkAnalysis, Plugin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginRunState {
    NotStarted,
    Routing,
    Analyzing,
    LocationResolving,
    Summarizing,
    Done,
    Failed,
}

impl PluginRunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Routing => "routing",
            Self::Analyzing => "analyzing",
            Self::LocationResolving => "location_resolving",
            Self::Summarizing => "summarizing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn can_transition_to(&self, next: PluginRunState) -> bool {
        use PluginRunState::*;
        match (self, next) {
            (s, Failed) => !s.is_terminal(),
            (NotStarted, Routing)
            | (Routing, Analyzing)
            | (Analyzing, LocationResolving)
            | (LocationResolving, Summarizing)
            | (Summarizing, Done) => true,
            _ => false,
        }
    }

    fn phase(&self) -> Phase {
        match self {
            Self::NotStarted | Self::Routing => Phase::Routing,
            Self::Analyzing => Phase::Analyzing,
            Self::LocationResolving => Phase::LocationResolving,
            Self::Summarizing => Phase::Summarizing,
            Self::Done => Phase::Done,
            Self::Failed => Phase::Failed,
        }
    }
}

impl std::fmt::Display for PluginRunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks and logs the state of one plugin run.
pub struct StateTracker<'a> {
    plugin: &'a str,
    logger: &'a RunLogger,
    state: PluginRunState,
}

impl<'a> StateTracker<'a> {
    pub fn new(plugin: &'a str, logger: &'a RunLogger) -> Self {
        Self {
            plugin,
            logger,
            state: PluginRunState::NotStarted,
        }
    }

    pub fn state(&self) -> PluginRunState {
        self.state
    }

    /// Move to `next`. Invalid transitions are refused and logged.
    pub fn advance(&mut self, next: PluginRunState) -> bool {
        if !self.state.can_transition_to(next) {
            debug_assert!(false, "invalid plugin state transition {} -> {}", self.state, next);
            self.logger.warn(
                Some(self.plugin),
                next.phase(),
                format!("refused state transition {} -> {}", self.state, next),
            );
            return false;
        }
        self.logger.log(
            LogLevel::Debug,
            Some(self.plugin),
            next.phase(),
            format!("{} -> {}", self.state, next),
            json!({ "from": self.state.as_str(), "to": next.as_str() }),
        );
        self.state = next;
        true
    }
}

/// Reasoning access for one plugin run: retries, accounting and logging.
pub struct ServiceCaller {
    service: Arc<dyn ReasoningService>,
    gate: CallGate,
    policy: RetryPolicy,
    logger: RunLogger,
    plugin: String,
    cost: Mutex<Cost>,
    retries: AtomicU32,
}

impl ServiceCaller {
    pub fn new(
        service: Arc<dyn ReasoningService>,
        gate: CallGate,
        policy: RetryPolicy,
        logger: RunLogger,
        plugin: impl Into<String>,
    ) -> Self {
        Self {
            service,
            gate,
            policy,
            logger,
            plugin: plugin.into(),
            cost: Mutex::new(Cost::default()),
            retries: AtomicU32::new(0),
        }
    }

    pub async fn invoke(&self, request: &ReasoningRequest) -> Result<ReasoningResponse, LlmError> {
        let logger = &self.logger;
        let plugin = self.plugin.as_str();
        let outcome = self
            .gate
            .call_with_retry(self.service.as_ref(), request, self.policy, |attempt, error, delay| {
                logger.log(
                    LogLevel::Warn,
                    Some(plugin),
                    Phase::Retry,
                    format!("attempt {} failed ({}), retrying in {:?}", attempt, error, delay),
                    json!({ "purpose": request.purpose, "attempt": attempt, "delay_ms": delay.as_millis() as u64 }),
                );
            })
            .await;

        self.retries.fetch_add(outcome.retries(), Ordering::Relaxed);
        let response = outcome.into_result()?;
        self.cost
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .merge(&Cost::single_call(
                response.usage.input_tokens,
                response.usage.output_tokens,
                response.cost_usd,
            ));
        Ok(response)
    }

    pub fn cost(&self) -> Cost {
        *self.cost.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::Relaxed)
    }
}

/// Executor tuning shared by every run.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub retry: RetryPolicy,
    pub allow_escalation: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            allow_escalation: true,
        }
    }
}

/// Everything a plugin run borrows from its analysis run.
pub struct RunScope<'a> {
    pub document: &'a Document,
    pub profile: &'a DocumentProfile,
    pub chunks: &'a [Chunk],
    pub router: &'a Router,
    pub logger: &'a RunLogger,
    pub events: Option<&'a mpsc::Sender<AnalysisEvent>>,
}

/// Stateless plugin runner; all per-run state lives in [`RunScope`].
pub struct PluginExecutor {
    service: Option<Arc<dyn ReasoningService>>,
    gate: CallGate,
    resolver: Arc<LocationResolver>,
    settings: ExecutorSettings,
}

impl PluginExecutor {
    pub fn new(
        service: Option<Arc<dyn ReasoningService>>,
        gate: CallGate,
        resolver: Arc<LocationResolver>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            service,
            gate,
            resolver,
            settings,
        }
    }

    /// Run a plugin and always return a result, even if it panics.
    pub async fn run(&self, plugin: &dyn Plugin, scope: &RunScope<'_>) -> PluginRunResult {
        let started = Instant::now();
        match AssertUnwindSafe(self.run_inner(plugin, scope, started))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => {
                let message = "plugin panicked".to_string();
                scope.logger.error(Some(plugin.name()), Phase::Failed, message.clone());
                PluginRunResult::failed(plugin.name(), message, elapsed_ms(started))
            }
        }
    }

    async fn run_inner(&self, plugin: &dyn Plugin, scope: &RunScope<'_>, started: Instant) -> PluginRunResult {
        let name = plugin.name();
        let logger = scope.logger;
        let mut state = StateTracker::new(name, logger);

        // Routing
        state.advance(PluginRunState::Routing);
        let spec = plugin.routing_spec();
        let decisions = join_all(scope.chunks.iter().map(|c| scope.router.route(c, &spec))).await;
        let routed: Vec<&Chunk> = scope
            .chunks
            .iter()
            .zip(&decisions)
            .filter(|(_, d)| d.should_process)
            .map(|(c, _)| c)
            .collect();
        for decision in &decisions {
            logger.log(
                LogLevel::Debug,
                Some(name),
                Phase::Routing,
                format!(
                    "{} {}: {}",
                    if decision.should_process { "include" } else { "skip" },
                    decision.chunk_id,
                    decision.reason
                ),
                json!({ "source": decision.source }),
            );
        }
        logger.info(
            Some(name),
            Phase::Routing,
            format!("{} of {} chunks routed", routed.len(), scope.chunks.len()),
        );

        // Analyzing
        state.advance(PluginRunState::Analyzing);
        let caller = self.service.clone().map(|service| {
            ServiceCaller::new(
                service,
                self.gate.clone(),
                self.settings.retry,
                logger.clone(),
                name,
            )
        });
        let ctx = AnalysisContext::new(scope.document, scope.profile, caller.as_ref());

        let outcomes = join_all(routed.iter().map(|chunk| {
            let ctx = &ctx;
            async move {
                let outcome = plugin.analyze_chunk(chunk, ctx).await;
                if let Some(events) = scope.events {
                    let _ = events
                        .send(AnalysisEvent::ChunkAnalyzed {
                            plugin: name.to_string(),
                            chunk_id: chunk.id.clone(),
                            findings: outcome.as_ref().map(|a| a.findings.len()).unwrap_or(0),
                            ok: outcome.is_ok(),
                        })
                        .await;
                }
                (*chunk, outcome)
            }
        }))
        .await;

        let mut analyzed: Vec<(&Chunk, ChunkAnalysis)> = Vec::new();
        let mut first_error: Option<String> = None;
        let mut chunks_failed = 0;
        for (chunk, outcome) in outcomes {
            match outcome {
                Ok(analysis) => analyzed.push((chunk, analysis)),
                Err(e) => {
                    chunks_failed += 1;
                    logger.log(
                        LogLevel::Warn,
                        Some(name),
                        Phase::Analyzing,
                        format!("chunk {} failed: {}", chunk.id, e),
                        json!({ "chunk_id": chunk.id, "transient": e.is_transient() }),
                    );
                    first_error.get_or_insert_with(|| e.to_string());
                }
            }
        }
        let chunks_analyzed = analyzed.len();
        let call_cost = caller.as_ref().map(|c| c.cost()).unwrap_or_default();
        let retries_used = caller.as_ref().map(|c| c.retries()).unwrap_or(0);
        let routing_cost = scope.router.cost_for(name).await;

        if chunks_analyzed == 0 && chunks_failed > 0 {
            state.advance(PluginRunState::Failed);
            let error = format!(
                "all {} chunks failed: {}",
                chunks_failed,
                first_error.unwrap_or_default()
            );
            logger.error(Some(name), Phase::Failed, error.clone());
            let mut cost = call_cost;
            cost.merge(&routing_cost);
            return PluginRunResult {
                plugin_name: name.to_string(),
                summary: String::new(),
                analysis_text: String::new(),
                comments: Vec::new(),
                cost,
                duration_ms: elapsed_ms(started),
                error: Some(error),
                status: PluginStatus::Failed,
                chunks_routed: routed.len(),
                chunks_analyzed: 0,
                chunks_failed,
                findings_dropped: 0,
                retries_used,
            };
        }

        // LocationResolving
        state.advance(PluginRunState::LocationResolving);
        let escalate = self.settings.allow_escalation;
        let resolutions = join_all(analyzed.iter().flat_map(|(chunk, analysis)| {
            analysis
                .findings
                .iter()
                .map(move |finding| self.resolve_finding(finding, chunk, escalate))
        }))
        .await;

        let mut comments = Vec::new();
        let mut escalation_cost = Cost::default();
        let mut findings_dropped = 0;
        for (finding, location, cost) in resolutions {
            escalation_cost.merge(&cost);
            let verified = location.filter(|loc| {
                scope.document.slice(loc.start_offset, loc.end_offset)
                    == Some(loc.quoted_text_as_found.as_str())
            });
            match verified {
                Some(location) => {
                    if let Some(ambiguity) = location.ambiguity {
                        logger.log(
                            LogLevel::Info,
                            Some(name),
                            Phase::LocationResolving,
                            format!(
                                "ambiguous quote {:?}: {} occurrences, chose offset {}",
                                finding.quoted_text,
                                ambiguity.count(),
                                location.start_offset
                            ),
                            json!({ "ambiguity": ambiguity }),
                        );
                    }
                    comments.push(Highlight {
                        finding: finding.clone(),
                        location,
                    });
                }
                None => {
                    findings_dropped += 1;
                    logger.log(
                        LogLevel::Info,
                        Some(name),
                        Phase::LocationResolving,
                        format!("dropped finding, quote not found: {:?}", finding.quoted_text),
                        json!({ "description": finding.description }),
                    );
                }
            }
        }
        comments.sort_by_key(|h| (h.start(), h.end()));

        // Summarizing
        state.advance(PluginRunState::Summarizing);
        let analyses: Vec<ChunkAnalysis> = analyzed.into_iter().map(|(_, a)| a).collect();
        let (summary, analysis_text) = plugin.summarize(&analyses, &comments);

        let mut cost = call_cost;
        cost.merge(&routing_cost);
        cost.merge(&escalation_cost);
        let status = PluginStatus::from_counts(chunks_analyzed, chunks_failed);
        let error = first_error.map(|e| format!("{} of {} chunks failed: {}", chunks_failed, routed.len(), e));

        state.advance(PluginRunState::Done);
        logger.info(
            Some(name),
            Phase::Done,
            format!(
                "{}: {} comments, {} dropped, {} chunks failed",
                status,
                comments.len(),
                findings_dropped,
                chunks_failed
            ),
        );

        PluginRunResult {
            plugin_name: name.to_string(),
            summary,
            analysis_text,
            comments,
            cost,
            duration_ms: elapsed_ms(started),
            error,
            status,
            chunks_routed: routed.len(),
            chunks_analyzed,
            chunks_failed,
            findings_dropped,
            retries_used,
        }
    }

    async fn resolve_finding<'f>(
        &self,
        finding: &'f Finding,
        chunk: &Chunk,
        escalate: bool,
    ) -> (&'f Finding, Option<ResolvedLocation>, Cost) {
        let escalation = match (&self.service, escalate) {
            (Some(service), true) => Some(Escalation {
                service: service.as_ref(),
                gate: &self.gate,
            }),
            _ => None,
        };
        let (location, cost) = self
            .resolver
            .resolve_with_escalation(
                &finding.quoted_text,
                chunk,
                finding.context_hint.as_deref(),
                escalation,
            )
            .await;
        (finding, location, cost)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
