//! Command-line interface.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod commands;
mod helpers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_config, LoadOptions};

use commands::analyze::AnalyzeArgs;

#[derive(Parser)]
#[command(name = "docreview")]
#[command(about = "Plugin-based document review with verified highlights")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run the review pipeline over a document
    Analyze {
        /// Document to review (UTF-8 text or markdown)
        file: PathBuf,
        /// Comma-separated plugin names (default: plugins.enabled from config)
        #[arg(short, long)]
        plugins: Option<String>,
        /// Print the run result and summary as JSON
        #[arg(long)]
        json: bool,
        /// Never ask the reasoning service to locate quotes
        #[arg(long)]
        no_escalation: bool,
        /// Maximum concurrent reasoning calls
        #[arg(long)]
        concurrency: Option<usize>,
        /// Do not use a reasoning service (local checks only)
        #[arg(long)]
        offline: bool,
    },

    /// Show the spelling convention and document type
    Classify {
        /// Document to classify
        file: PathBuf,
    },

    /// Show how a document is split into chunks
    Chunks {
        /// Document to chunk
        file: PathBuf,
        /// Maximum chunk size in bytes (default: analysis.max_chunk_chars)
        #[arg(short, long)]
        max_chars: Option<usize>,
    },

    /// Find a quote in a document
    Locate {
        /// Document to search
        file: PathBuf,
        /// Approximate quote to locate
        quote: String,
        /// Surrounding text used to pick between repeated occurrences
        #[arg(long)]
        hint: Option<String>,
    },

    /// Show reasoning service configuration and available models
    Llm,

    /// List available plugins
    Plugins,
}

/// Parse arguments, load configuration and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        ..LoadOptions::default()
    };
    let config = load_config(&options).await?;

    match cli.command {
        Commands::Analyze {
            file,
            plugins,
            json,
            no_escalation,
            concurrency,
            offline,
        } => {
            let args = AnalyzeArgs {
                file,
                plugins,
                json,
                no_escalation,
                concurrency,
                offline,
            };
            commands::analyze::cmd_analyze(&config, args).await
        }
        Commands::Classify { file } => commands::classify::cmd_classify(&config, &file).await,
        Commands::Chunks { file, max_chars } => {
            commands::chunks::cmd_chunks(&config, &file, max_chars).await
        }
        Commands::Locate { file, quote, hint } => {
            commands::locate::cmd_locate(&config, &file, &quote, hint.as_deref()).await
        }
        Commands::Llm => commands::llm::cmd_llm(&config).await,
        Commands::Plugins => commands::plugins::cmd_plugins(&config),
    }
}
