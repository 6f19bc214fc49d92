//! Quote location over a whole document.

use std::path::Path;

use console::style;

use crate::analysis::location::whole_document_chunk;
use crate::analysis::{load_document, LocationResolver};
use crate::config::Config;

pub async fn cmd_locate(config: &Config, file: &Path, quote: &str, hint: Option<&str>) -> anyhow::Result<()> {
    let document = load_document(file).await?;
    let resolver = LocationResolver::new(config.location.clone());
    let chunk = whole_document_chunk(&document);

    let Some(found) = resolver.resolve(quote, &chunk, hint) else {
        anyhow::bail!("quote not found in {}", file.display());
    };

    let (line, col) = document.line_col(found.start_offset).unwrap_or((0, 0));
    println!("{:<14} {}..{}", "Bytes:", found.start_offset, found.end_offset);
    if let Some((start, end)) = document.char_span(found.start_offset, found.end_offset) {
        println!("{:<14} {}..{}", "Chars:", start, end);
    }
    println!("{:<14} {}:{}", "Line:col:", line, col);
    println!("{:<14} {}", "Strategy:", style(found.strategy).cyan());
    println!("{:<14} {:.3}", "Similarity:", found.similarity);
    if let Some(ambiguity) = found.ambiguity {
        println!(
            "{:<14} {} candidates ({:?})",
            "Ambiguous:",
            ambiguity.count(),
            ambiguity
        );
    }
    println!("{:<14} \"{}\"", "Text:", found.quoted_text_as_found);

    Ok(())
}
