//! Chunk boundary inspection.

use std::path::Path;

use console::style;

use crate::analysis::{load_document, Chunker};
use crate::cli::helpers::truncate;
use crate::config::Config;

pub async fn cmd_chunks(config: &Config, file: &Path, max_chars: Option<usize>) -> anyhow::Result<()> {
    let max = max_chars.unwrap_or(config.analysis.max_chunk_chars);
    anyhow::ensure!(max > 0, "--max-chars must be at least 1");

    let document = load_document(file).await?;
    let chunks = Chunker::new(max).chunk(&document);

    println!(
        "\n{} ({} bytes, max {} per chunk)",
        style(format!("{} chunk(s)", chunks.len())).bold(),
        document.len(),
        max
    );
    println!("{}", "-".repeat(60));
    for chunk in &chunks {
        println!(
            "{:>4} [{:>6}..{:<6}) {:<8} {:>4} words  {}",
            chunk.metadata.index,
            chunk.start_offset,
            chunk.end_offset,
            chunk.metadata.kind.as_str(),
            chunk.metadata.word_count,
            style(chunk.metadata.section.as_deref().unwrap_or("-")).cyan()
        );
        println!("       {}", style(truncate(chunk.text.trim(), 70)).dim());
    }

    Ok(())
}
