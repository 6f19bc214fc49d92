//! Document-level analysis runs.
//!
//! An [`Orchestrator`] is long-lived and holds only shared, run-independent
//! resources: the reasoning service, the global call semaphore and the
//! stateless chunker and resolver. Everything mutable (run id, log, routing
//! cache, cost counters) is created inside each `analyze` call, so
//! concurrent runs on different documents never observe each other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::info;
use uuid::Uuid;

use super::chunker::{Chunker, DEFAULT_MAX_CHUNK_CHARS};
use super::classifier::{ClassifierConfig, DocumentProfile};
use super::executor::{ExecutorSettings, PluginExecutor, RunScope};
use super::location::{LocationConfig, LocationResolver};
use super::retry::CallGate;
use super::router::Router;
use super::run_log::{LogLevel, Phase, RunLogger};
use crate::llm::ReasoningService;
use crate::models::{Cost, Document, Highlight, PluginStatus, RunResult};
use crate::plugins::Plugin;

/// The only errors that abort a whole run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("document '{0}' is empty")]
    EmptyDocument(String),
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no plugins selected")]
    NoPlugins,
}

/// Progress notifications for UIs. Sending never blocks the run on a
/// dropped receiver.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalysisEvent {
    RunStarted {
        run_id: String,
        document_id: String,
        chunks: usize,
        plugins: Vec<String>,
    },
    PluginStarted {
        plugin: String,
    },
    ChunkAnalyzed {
        plugin: String,
        chunk_id: String,
        findings: usize,
        ok: bool,
    },
    PluginCompleted {
        plugin: String,
        status: PluginStatus,
        comments: usize,
        duration_ms: u64,
    },
    RunCompleted {
        run_id: String,
        highlights: usize,
        cost_usd: f64,
        duration_ms: u64,
    },
}

/// Orchestrator tuning, usually built from the `[analysis]`, `[location]`
/// and `[classifier]` config sections.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Global cap on in-flight reasoning calls across all plugins.
    pub max_concurrency: usize,
    pub max_chunk_chars: usize,
    pub call_timeout: Duration,
    pub executor: ExecutorSettings,
    pub location: LocationConfig,
    pub classifier: ClassifierConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            call_timeout: Duration::from_secs(60),
            executor: ExecutorSettings::default(),
            location: LocationConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

pub struct Orchestrator {
    service: Option<Arc<dyn ReasoningService>>,
    permits: Arc<Semaphore>,
    call_timeout: Duration,
    chunker: Chunker,
    resolver: Arc<LocationResolver>,
    executor_settings: ExecutorSettings,
    classifier: ClassifierConfig,
}

impl Orchestrator {
    pub fn new(service: Option<Arc<dyn ReasoningService>>, settings: OrchestratorSettings) -> Self {
        Self {
            service,
            permits: Arc::new(Semaphore::new(settings.max_concurrency.max(1))),
            call_timeout: settings.call_timeout,
            chunker: Chunker::new(settings.max_chunk_chars),
            resolver: Arc::new(LocationResolver::new(settings.location)),
            executor_settings: settings.executor,
            classifier: settings.classifier,
        }
    }

    /// An orchestrator that never calls a reasoning service.
    pub fn offline(settings: OrchestratorSettings) -> Self {
        Self::new(None, settings)
    }

    pub fn has_service(&self) -> bool {
        self.service.is_some()
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Run every plugin over the document and merge the results.
    pub async fn analyze(
        &self,
        document: &Document,
        plugins: &[Arc<dyn Plugin>],
    ) -> Result<RunResult, OrchestratorError> {
        self.run(document, plugins, None).await
    }

    /// Like [`Orchestrator::analyze`], streaming progress to `events`.
    pub async fn analyze_with_events(
        &self,
        document: &Document,
        plugins: &[Arc<dyn Plugin>],
        events: mpsc::Sender<AnalysisEvent>,
    ) -> Result<RunResult, OrchestratorError> {
        self.run(document, plugins, Some(&events)).await
    }

    /// Read a UTF-8 file and analyze it.
    pub async fn analyze_file(
        &self,
        path: &Path,
        plugins: &[Arc<dyn Plugin>],
    ) -> Result<RunResult, OrchestratorError> {
        let document = load_document(path).await?;
        self.analyze(&document, plugins).await
    }

    async fn run(
        &self,
        document: &Document,
        plugins: &[Arc<dyn Plugin>],
        events: Option<&mpsc::Sender<AnalysisEvent>>,
    ) -> Result<RunResult, OrchestratorError> {
        if plugins.is_empty() {
            return Err(OrchestratorError::NoPlugins);
        }
        if document.is_blank() {
            return Err(OrchestratorError::EmptyDocument(document.id.clone()));
        }

        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let logger = RunLogger::new(run_id.as_str());
        let plugin_names: Vec<String> = plugins.iter().map(|p| p.name().to_string()).collect();
        logger.log(
            LogLevel::Info,
            None,
            Phase::Run,
            format!("analyzing {} with {} plugin(s)", document.id, plugins.len()),
            json!({ "document_id": document.id, "bytes": document.len(), "plugins": plugin_names }),
        );

        let profile = DocumentProfile::classify(&document.full_text, &self.classifier);
        logger.log(
            LogLevel::Info,
            None,
            Phase::Classify,
            format!(
                "convention {} ({:.2}), type {} ({:.2})",
                profile.convention.label,
                profile.convention.confidence,
                profile.doc_type.label,
                profile.doc_type.confidence
            ),
            json!({
                "us_score": profile.convention.us_score,
                "uk_score": profile.convention.uk_score,
            }),
        );

        let chunks = self.chunker.chunk(document);
        logger.info(
            None,
            Phase::Chunk,
            format!("{} chunk(s) of at most {} bytes", chunks.len(), self.chunker.max_chunk_chars()),
        );
        emit(
            events,
            AnalysisEvent::RunStarted {
                run_id: run_id.clone(),
                document_id: document.id.clone(),
                chunks: chunks.len(),
                plugins: plugin_names,
            },
        )
        .await;

        let gate = CallGate::new(self.permits.clone(), self.call_timeout);
        let router = Router::new(self.service.clone(), gate.clone(), logger.clone());
        let executor = PluginExecutor::new(
            self.service.clone(),
            gate,
            self.resolver.clone(),
            self.executor_settings.clone(),
        );
        let scope = RunScope {
            document,
            profile: &profile,
            chunks: &chunks,
            router: &router,
            logger: &logger,
            events,
        };

        let plugin_results = join_all(plugins.iter().map(|plugin| {
            let executor = &executor;
            let scope = &scope;
            async move {
                emit(
                    events,
                    AnalysisEvent::PluginStarted {
                        plugin: plugin.name().to_string(),
                    },
                )
                .await;
                let result = executor.run(plugin.as_ref(), scope).await;
                emit(
                    events,
                    AnalysisEvent::PluginCompleted {
                        plugin: result.plugin_name.clone(),
                        status: result.status,
                        comments: result.comments.len(),
                        duration_ms: result.duration_ms,
                    },
                )
                .await;
                result
            }
        }))
        .await;

        let priorities: HashMap<&str, u32> = plugins.iter().map(|p| (p.name(), p.priority())).collect();
        let highlights = merge_highlights(
            plugin_results.iter().flat_map(|r| r.comments.iter().cloned()),
            &priorities,
        );
        let total_cost: Cost = plugin_results.iter().map(|r| r.cost).sum();
        let duration_ms = started.elapsed().as_millis() as u64;

        logger.log(
            LogLevel::Info,
            None,
            Phase::Done,
            format!(
                "run finished: {} highlight(s), {} call(s), ${:.6}",
                highlights.len(),
                total_cost.calls,
                total_cost.usd
            ),
            json!({ "duration_ms": duration_ms }),
        );
        info!(run_id = %run_id, highlights = highlights.len(), duration_ms, "Analysis run complete");

        emit(
            events,
            AnalysisEvent::RunCompleted {
                run_id: run_id.clone(),
                highlights: highlights.len(),
                cost_usd: total_cost.usd,
                duration_ms,
            },
        )
        .await;

        Ok(RunResult {
            run_id,
            document_id: document.id.clone(),
            profile,
            plugin_results,
            highlights,
            chunk_count: chunks.len(),
            total_cost,
            duration_ms,
            log: logger.events(),
        })
    }
}

async fn emit(events: Option<&mpsc::Sender<AnalysisEvent>>, event: AnalysisEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}

/// Stable merge by start offset, then plugin priority, then end offset.
pub fn merge_highlights(
    highlights: impl IntoIterator<Item = Highlight>,
    priorities: &HashMap<&str, u32>,
) -> Vec<Highlight> {
    let mut merged: Vec<Highlight> = highlights.into_iter().collect();
    merged.sort_by_key(|h| {
        (
            h.start(),
            priorities.get(h.plugin_name()).copied().unwrap_or(u32::MAX),
            h.end(),
        )
    });
    merged
}

/// Read a UTF-8 file into a document whose id is the file stem plus a
/// content hash prefix.
pub async fn load_document(path: &Path) -> Result<Document, OrchestratorError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| OrchestratorError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let id = format!("{}-{}", stem, &Document::compute_hash(&text)[..8]);
    Ok(Document::new(id, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::router::RoutingExample;
    use crate::models::{Finding, MatchStrategy, ResolvedLocation};
    use crate::plugins::{AnalysisContext, ChunkAnalysis, MathPlugin, PluginError};
    use crate::models::Chunk;
    use async_trait::async_trait;

    /// Reports fixed quotes without a reasoning service.
    struct QuotePlugin {
        name: &'static str,
        quotes: Vec<&'static str>,
        priority: u32,
    }

    #[async_trait]
    impl Plugin for QuotePlugin {
        fn name(&self) -> &str {
            self.name
        }
        fn when_to_use(&self) -> &str {
            "always"
        }
        fn routing_examples(&self) -> Vec<RoutingExample> {
            Vec::new()
        }
        fn priority(&self) -> u32 {
            self.priority
        }
        async fn analyze_chunk(&self, chunk: &Chunk, _ctx: &AnalysisContext<'_>) -> Result<ChunkAnalysis, PluginError> {
            let findings = self
                .quotes
                .iter()
                .filter(|q| chunk.text.contains(*q))
                .map(|q| Finding::new(self.name, *q, "noted"))
                .collect();
            Ok(ChunkAnalysis {
                summary: String::new(),
                findings,
            })
        }
    }

    fn plugin(name: &'static str, quotes: Vec<&'static str>, priority: u32) -> Arc<dyn Plugin> {
        Arc::new(QuotePlugin { name, quotes, priority })
    }

    #[tokio::test]
    async fn test_math_example_offline() {
        let orchestrator = Orchestrator::offline(OrchestratorSettings::default());
        let document = Document::new("calc", "Calculate: 10 + 5 = 16");
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(MathPlugin::new())];
        let result = orchestrator.analyze(&document, &plugins).await.unwrap();

        assert_eq!(result.highlights.len(), 1);
        let h = &result.highlights[0];
        assert_eq!((h.start(), h.end()), (11, 22));
        assert_eq!(h.location.quoted_text_as_found, "10 + 5 = 16");
        assert_eq!(h.location.strategy, MatchStrategy::Exact);
        assert_eq!(result.status_of("math"), Some(PluginStatus::Success));
        assert_eq!(result.total_cost.calls, 0);
    }

    #[tokio::test]
    async fn test_fatal_errors() {
        let orchestrator = Orchestrator::offline(OrchestratorSettings::default());
        let plugins = vec![plugin("p", vec![], 1)];
        let blank = Document::new("blank", "  \n\n ");
        assert!(matches!(
            orchestrator.analyze(&blank, &plugins).await,
            Err(OrchestratorError::EmptyDocument(_))
        ));
        let doc = Document::new("d", "text");
        assert!(matches!(orchestrator.analyze(&doc, &[]).await, Err(OrchestratorError::NoPlugins)));
        assert!(matches!(
            orchestrator.analyze_file(Path::new("/nonexistent/file.md"), &plugins).await,
            Err(OrchestratorError::Unreadable { .. })
        ));
    }

    #[tokio::test]
    async fn test_ties_sort_by_priority() {
        let orchestrator = Orchestrator::offline(OrchestratorSettings::default());
        let document = Document::new("d", "The quick brown fox jumps.");
        let plugins = vec![
            plugin("late", vec!["quick"], 50),
            plugin("early", vec!["quick brown"], 5),
            plugin("first", vec!["The"], 99),
        ];
        let result = orchestrator.analyze(&document, &plugins).await.unwrap();
        let order: Vec<&str> = result.highlights.iter().map(|h| h.plugin_name()).collect();
        assert_eq!(order, vec!["first", "early", "late"]);
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let orchestrator = Orchestrator::offline(OrchestratorSettings::default());
        let a = Document::new("a", "The speling is wrong here.");
        let b = Document::new("b", "Everything is fine here.");
        let plugins = vec![plugin("spell", vec!["speling"], 1)];

        let (ra, rb) = tokio::join!(orchestrator.analyze(&a, &plugins), orchestrator.analyze(&b, &plugins));
        let (ra, rb) = (ra.unwrap(), rb.unwrap());
        assert_ne!(ra.run_id, rb.run_id);
        assert_eq!(ra.highlights.len(), 1);
        assert!(rb.highlights.is_empty());
        assert!(ra.log.iter().all(|e| !e.message.contains(" b ")));

        let again = orchestrator.analyze(&a, &plugins).await.unwrap();
        assert_ne!(again.run_id, ra.run_id);
        assert_eq!(again.highlights, ra.highlights);
        assert_eq!(again.log.len(), ra.log.len());
    }

    #[tokio::test]
    async fn test_events_stream() {
        let orchestrator = Orchestrator::offline(OrchestratorSettings::default());
        let document = Document::new("d", "One.\n\nTwo.");
        let plugins = vec![plugin("p", vec!["One"], 1)];
        let (tx, mut rx) = mpsc::channel(64);
        let result = orchestrator.analyze_with_events(&document, &plugins, tx).await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(AnalysisEvent::RunStarted { .. })));
        assert!(matches!(events.last(), Some(AnalysisEvent::RunCompleted { highlights: 1, .. })));
        let analyzed = events
            .iter()
            .filter(|e| matches!(e, AnalysisEvent::ChunkAnalyzed { .. }))
            .count();
        assert_eq!(analyzed, result.chunk_count);
    }

    #[test]
    fn test_merge_is_stable() {
        let h = |plugin: &str, start, end| Highlight {
            finding: Finding::new(plugin, "x", "y"),
            location: ResolvedLocation {
                start_offset: start,
                end_offset: end,
                quoted_text_as_found: "x".into(),
                strategy: MatchStrategy::Exact,
                similarity: 1.0,
                ambiguity: None,
            },
        };
        let priorities: HashMap<&str, u32> = [("a", 1), ("b", 1)].into_iter().collect();
        let merged = merge_highlights(vec![h("b", 5, 6), h("a", 5, 6), h("a", 0, 3)], &priorities);
        let order: Vec<&str> = merged.iter().map(|h| h.plugin_name()).collect();
        assert_eq!(order, vec!["a", "b", "a"]);
    }
}
