//! Full review pipeline over one document.

use std::path::PathBuf;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::analysis::{load_document, AnalysisEvent, Orchestrator, RunLogger};
use crate::cli::helpers::{connect_service, select_plugins, styled_importance, truncate};
use crate::config::Config;

pub struct AnalyzeArgs {
    pub file: PathBuf,
    pub plugins: Option<String>,
    pub json: bool,
    pub no_escalation: bool,
    pub concurrency: Option<usize>,
    pub offline: bool,
}

pub async fn cmd_analyze(config: &Config, args: AnalyzeArgs) -> anyhow::Result<()> {
    let mut settings = config.orchestrator_settings();
    if let Some(n) = args.concurrency {
        anyhow::ensure!(n > 0, "--concurrency must be at least 1");
        settings.max_concurrency = n;
    }
    if args.no_escalation {
        settings.executor.allow_escalation = false;
    }

    let plugins = select_plugins(config, args.plugins.as_deref())?;
    let document = load_document(&args.file).await?;
    let service = connect_service(config, args.offline).await?;
    if service.is_none() && !args.json {
        println!(
            "{} No reasoning service: only local checks will produce findings",
            style("!").yellow()
        );
    }
    let orchestrator = Orchestrator::new(service, settings);

    let pb = if args.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed}] {pos} chunk(s) analyzed {wide_msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let (tx, mut rx) = mpsc::channel(256);
    let progress = {
        let pb = pb.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    AnalysisEvent::RunStarted { chunks, plugins, .. } => {
                        pb.set_message(format!("{} chunks × {} plugins", chunks, plugins.len()));
                    }
                    AnalysisEvent::PluginStarted { plugin } => {
                        pb.set_message(format!("running {}", plugin));
                    }
                    AnalysisEvent::ChunkAnalyzed { .. } => pb.inc(1),
                    AnalysisEvent::PluginCompleted {
                        plugin,
                        status,
                        comments,
                        ..
                    } => {
                        pb.println(format!("  {} {} ({} comments)", plugin, status, comments));
                    }
                    AnalysisEvent::RunCompleted { .. } => pb.set_message("done"),
                }
            }
        })
    };

    let result = orchestrator
        .analyze_with_events(&document, &plugins, tx)
        .await;
    progress.await?;
    pb.finish_and_clear();
    let result = result?;
    let summary = RunLogger::summarize(&result);

    if args.json {
        let output = serde_json::json!({ "result": result, "summary": summary });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "\n{} ({}, {} / {})",
        style(format!("Highlights: {}", result.highlights.len())).bold(),
        result.document_id,
        result.profile.convention.label,
        result.profile.doc_type.label
    );
    println!("{}", "-".repeat(60));
    for highlight in &result.highlights {
        let (line, col) = document.line_col(highlight.start()).unwrap_or((0, 0));
        println!(
            "{:>5}:{:<4} {} {} \"{}\"",
            line,
            col,
            style(format!("[{}]", highlight.plugin_name())).cyan(),
            styled_importance(highlight.finding.importance),
            truncate(&highlight.location.quoted_text_as_found, 60)
        );
        println!("            {}", highlight.finding.description);
    }

    println!("\n{}", style("Summary").bold());
    println!("{}", "-".repeat(60));
    print!("{}", summary.render_text());
    for plugin in &result.plugin_results {
        if !plugin.summary.is_empty() {
            println!("  {}", style(&plugin.summary).dim());
        }
    }

    Ok(())
}
