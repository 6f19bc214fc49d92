//! End-to-end runs through the public API with a scripted reasoning service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use docreview::analysis::router::{CostTier, Router, RoutingSpec};
use docreview::analysis::{
    CallGate, Orchestrator, OrchestratorSettings, Phase, RetryPolicy, RunLogger,
};
use docreview::llm::{LlmError, ReasoningRequest, ReasoningResponse, ReasoningService, Usage};
use docreview::models::{Ambiguity, Chunk, ChunkKind, ChunkMetadata, Document, MatchStrategy, PluginStatus};
use docreview::plugins::{
    CustomPlugin, CustomPluginConfig, FactCheckPlugin, MathPlugin, Plugin, SpellingPlugin,
};

type Handler = dyn Fn(&ReasoningRequest, u32) -> Result<String, LlmError> + Send + Sync;

/// In-process service: a handler decides each reply from the request and
/// how many times that exact prompt has been seen.
struct Scripted {
    handler: Box<Handler>,
    seen: Mutex<HashMap<String, u32>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl Scripted {
    fn new<F>(handler: F) -> Self
    where
        F: Fn(&ReasoningRequest, u32) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            seen: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls_for(&self, purpose: &str) -> u32 {
        let seen = self.seen.lock().unwrap();
        seen.iter()
            .filter(|(k, _)| k.starts_with(&format!("{}|", purpose)))
            .map(|(_, v)| *v)
            .sum()
    }
}

#[async_trait]
impl ReasoningService for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, request: &ReasoningRequest) -> Result<ReasoningResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let attempt = {
            let mut seen = self.seen.lock().unwrap();
            let n = seen
                .entry(format!("{}|{}", request.purpose, request.prompt))
                .or_insert(0);
            *n += 1;
            *n
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = (self.handler)(request, attempt);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        reply.map(|text| ReasoningResponse {
            text,
            model: "scripted".into(),
            usage: Usage {
                input_tokens: 100,
                output_tokens: 20,
            },
            cost_usd: 0.001,
        })
    }
}

const ROUTE_YES: &str = r#"{"shouldProcess": true, "reason": "relevant"}"#;
const NO_FINDINGS: &str = r#"{"summary": "nothing", "findings": []}"#;

fn finding(quote: &str, hint: Option<&str>) -> String {
    let hint = hint
        .map(|h| format!(r#", "contextHint": "{}""#, h))
        .unwrap_or_default();
    format!(
        r#"{{"summary": "one issue", "findings": [{{"quotedText": "{}"{}, "importance": "high", "description": "issue"}}]}}"#,
        quote, hint
    )
}

/// Replies "speling" findings for any chunk containing the word.
fn spelling_handler(request: &ReasoningRequest, _attempt: u32) -> Result<String, LlmError> {
    match request.purpose.as_str() {
        "route" => Ok(ROUTE_YES.to_string()),
        "analyze" if request.prompt.contains("speling") => Ok(finding("speling", None)),
        _ => Ok(NO_FINDINGS.to_string()),
    }
}

fn fast_settings() -> OrchestratorSettings {
    let mut settings = OrchestratorSettings::default();
    settings.call_timeout = Duration::from_secs(5);
    settings.executor.retry =
        RetryPolicy::with_retries(2, Duration::from_millis(1), Duration::from_millis(5));
    settings
}

fn orchestrator(service: Arc<Scripted>, settings: OrchestratorSettings) -> Orchestrator {
    Orchestrator::new(Some(service as Arc<dyn ReasoningService>), settings)
}

fn custom(name: &str, keywords: &[&str]) -> Arc<dyn Plugin> {
    Arc::new(CustomPlugin::new(CustomPluginConfig {
        name: name.to_string(),
        when_to_use: "Any prose".to_string(),
        instructions: "Report problems.".to_string(),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        examples: Vec::new(),
        cost_tier: CostTier::Low,
        on_ambiguity: None,
        priority: 50,
    }))
}

#[tokio::test]
async fn math_error_is_highlighted_at_exact_offsets() {
    let service = Arc::new(Scripted::new(|request, _| match request.purpose.as_str() {
        "analyze" => Ok(finding("10 + 5 = 16", None)),
        _ => Ok(ROUTE_YES.to_string()),
    }));
    let document = Document::new("calc", "Calculate: 10 + 5 = 16");
    let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(MathPlugin::new())];

    let result = orchestrator(service.clone(), fast_settings())
        .analyze(&document, &plugins)
        .await
        .unwrap();

    assert_eq!(result.highlights.len(), 1);
    let h = &result.highlights[0];
    assert_eq!((h.start(), h.end()), (11, 22));
    assert_eq!(h.location.quoted_text_as_found, "10 + 5 = 16");
    assert_eq!(document.slice(h.start(), h.end()), Some("10 + 5 = 16"));
    // Routed by keyword, so the only call is the analysis.
    assert_eq!(service.calls_for("route"), 0);
    assert_eq!(result.total_cost.calls, 1);
}

#[tokio::test]
async fn concurrent_runs_do_not_share_state() {
    let service = Arc::new(Scripted::new(spelling_handler));
    let orchestrator = orchestrator(service, fast_settings());
    let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(SpellingPlugin::new())];
    let a = Document::new("a", "This sentence has a speling mistake in it.");
    let b = Document::new("b", "Every word in this sentence is spelled correctly.");

    let (ra, rb) = tokio::join!(orchestrator.analyze(&a, &plugins), orchestrator.analyze(&b, &plugins));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_ne!(ra.run_id, rb.run_id);
    assert_eq!(ra.highlights.len(), 1);
    assert_eq!(ra.highlights[0].location.quoted_text_as_found, "speling");
    assert!(rb.highlights.is_empty());
    assert_eq!(ra.document_id, "a");
    assert_eq!(rb.document_id, "b");

    // Re-running produces a fresh, equivalent result.
    let again = orchestrator.analyze(&a, &plugins).await.unwrap();
    assert_ne!(again.run_id, ra.run_id);
    assert_eq!(again.highlights, ra.highlights);
}

#[tokio::test]
async fn failing_chunk_gives_partial_status() {
    let service = Arc::new(Scripted::new(|request, attempt| {
        if request.purpose == "analyze" && request.prompt.contains("BROKEN") {
            return Err(LlmError::Api {
                status: 400,
                message: "bad request".into(),
            });
        }
        spelling_handler(request, attempt)
    }));
    let mut settings = fast_settings();
    settings.max_chunk_chars = 40;
    let document = Document::new(
        "d",
        "A speling mistake lives here.\n\nBROKEN paragraph text.\n\nAnother speling slip.\n",
    );
    let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(SpellingPlugin::new())];

    let result = orchestrator(service, settings)
        .analyze(&document, &plugins)
        .await
        .unwrap();

    assert_eq!(result.chunk_count, 3);
    let spelling = result.result_for("spelling").unwrap();
    assert_eq!(spelling.status, PluginStatus::Partial);
    assert_eq!(spelling.chunks_analyzed, 2);
    assert_eq!(spelling.chunks_failed, 1);
    assert_eq!(spelling.retries_used, 0);
    assert!(spelling.error.is_some());
    assert_eq!(result.highlights.len(), 2);
    for h in &result.highlights {
        assert_eq!(document.slice(h.start(), h.end()), Some("speling"));
    }

    let summary = RunLogger::summarize(&result);
    assert_eq!(summary.status, PluginStatus::Partial);
    assert!(!summary.plugins[0].key_issues.is_empty());
}

#[tokio::test]
async fn failed_plugin_is_data_not_an_error() {
    let service = Arc::new(Scripted::new(|request, attempt| {
        if request.purpose == "analyze" && request.prompt.contains("fact checker") {
            return Ok("I cannot answer that.".to_string());
        }
        spelling_handler(request, attempt)
    }));
    let document = Document::new(
        "facts",
        "The Eiffel Tower was completed in 1889 and has a speling error nearby.",
    );
    let plugins: Vec<Arc<dyn Plugin>> =
        vec![Arc::new(SpellingPlugin::new()), Arc::new(FactCheckPlugin::new())];

    let result = orchestrator(service, fast_settings())
        .analyze(&document, &plugins)
        .await
        .unwrap();

    assert_eq!(result.status_of("spelling"), Some(PluginStatus::Success));
    let fact = result.result_for("fact-check").unwrap();
    assert_eq!(fact.status, PluginStatus::Failed);
    assert!(fact.comments.is_empty());
    assert!(fact.error.as_deref().unwrap().contains("malformed"));
    assert_eq!(result.highlights.len(), 1);
    assert_eq!(RunLogger::summarize(&result).status, PluginStatus::Partial);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let service = Arc::new(Scripted::new(|request, attempt| {
        if request.purpose == "analyze" && attempt == 1 {
            return Err(LlmError::Timeout(1));
        }
        spelling_handler(request, attempt)
    }));
    let document = Document::new("d", "Just one speling problem.");
    let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(SpellingPlugin::new())];

    let result = orchestrator(service.clone(), fast_settings())
        .analyze(&document, &plugins)
        .await
        .unwrap();

    let spelling = result.result_for("spelling").unwrap();
    assert_eq!(spelling.status, PluginStatus::Success);
    assert_eq!(spelling.retries_used, 1);
    assert_eq!(service.calls_for("analyze"), 2);
    assert_eq!(result.highlights.len(), 1);
    assert!(result.log.iter().any(|e| e.phase == Phase::Retry));
}

#[tokio::test]
async fn repeated_quote_resolves_near_hint() {
    let service = Arc::new(Scripted::new(|request, _| match request.purpose.as_str() {
        "analyze" => Ok(finding("sat", Some("the dog sat on"))),
        _ => Ok(ROUTE_YES.to_string()),
    }));
    let text = "The cat sat. Later, the dog sat on the mat.";
    let document = Document::new("d", text);
    let plugins = vec![custom("grammar", &["cat"])];

    let result = orchestrator(service, fast_settings())
        .analyze(&document, &plugins)
        .await
        .unwrap();

    assert_eq!(result.highlights.len(), 1);
    let h = &result.highlights[0];
    let expected = text.find("dog sat").unwrap() + 4;
    assert_eq!((h.start(), h.end()), (expected, expected + 3));
    assert_eq!(h.location.ambiguity, Some(Ambiguity::NearestToHint { count: 2 }));
    assert!(result
        .log
        .iter()
        .any(|e| e.phase == Phase::LocationResolving && e.message.contains("ambiguous")));
}

#[tokio::test]
async fn escalation_recovers_paraphrased_quote() {
    let service = Arc::new(Scripted::new(|request, _| match request.purpose.as_str() {
        "analyze" => Ok(finding("teh qick fox", None)),
        "locate" => Ok(r#"{"found": true, "exactText": "the quick fox"}"#.to_string()),
        _ => Ok(ROUTE_YES.to_string()),
    }));
    let document = Document::new("d", "Yesterday the quick fox jumped over the lazy dog.");
    let plugins = vec![custom("typos", &["fox"])];

    let result = orchestrator(service.clone(), fast_settings())
        .analyze(&document, &plugins)
        .await
        .unwrap();
    assert_eq!(result.highlights.len(), 1);
    let h = &result.highlights[0];
    assert_eq!(h.location.strategy, MatchStrategy::Escalated);
    assert_eq!(document.slice(h.start(), h.end()), Some("the quick fox"));
    // Escalation cost is charged to the plugin.
    assert_eq!(result.total_cost.calls, 2);

    let mut settings = fast_settings();
    settings.executor.allow_escalation = false;
    let result = orchestrator(service, settings)
        .analyze(&document, &plugins)
        .await
        .unwrap();
    assert!(result.highlights.is_empty());
    assert_eq!(result.result_for("typos").unwrap().findings_dropped, 1);
}

#[tokio::test]
async fn global_cap_bounds_in_flight_calls() {
    let service = Arc::new(
        Scripted::new(|_, _| Ok(NO_FINDINGS.to_string())).with_delay(Duration::from_millis(20)),
    );
    let mut settings = fast_settings();
    settings.max_concurrency = 2;
    settings.max_chunk_chars = 30;
    let text: String = (1..=6)
        .map(|i| format!("Paragraph number {} is here.\n\n", i))
        .collect();
    let document = Document::new("d", text);
    let plugins = vec![custom("one", &["paragraph"]), custom("two", &["paragraph"])];

    let result = orchestrator(service.clone(), settings)
        .analyze(&document, &plugins)
        .await
        .unwrap();

    assert_eq!(result.chunk_count, 6);
    assert_eq!(service.calls.load(Ordering::SeqCst), 12);
    let peak = service.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak in-flight calls was {}", peak);
    assert!(peak >= 1);
}

#[tokio::test]
async fn routing_is_idempotent_within_a_run() {
    let service = Arc::new(Scripted::new(|_, _| Ok(ROUTE_YES.to_string())));
    let gate = CallGate::new(Arc::new(Semaphore::new(2)), Duration::from_secs(5));
    let router = Router::new(
        Some(service.clone() as Arc<dyn ReasoningService>),
        gate,
        RunLogger::new("run"),
    );
    let chunk = Chunk {
        id: "chunk-0000-test".into(),
        text: "An unremarkable sentence about gardens.".into(),
        start_offset: 0,
        end_offset: 39,
        metadata: ChunkMetadata {
            index: 0,
            section: None,
            kind: ChunkKind::Prose,
            word_count: 5,
        },
    };
    let spec = RoutingSpec::new("p", "Prose about plants", CostTier::High);

    let first = router.route(&chunk, &spec).await;
    let second = router.route(&chunk, &spec).await;
    assert_eq!(first, second);
    assert!(first.should_process);
    assert_eq!(service.calls_for("route"), 1);
    assert_eq!(router.cost_for("p").await.calls, 1);
}
