//! Document classification output.

use std::path::Path;

use console::style;

use crate::analysis::classifier::{DocumentProfile, Side};
use crate::analysis::load_document;
use crate::config::Config;

const MAX_EVIDENCE_SHOWN: usize = 12;

pub async fn cmd_classify(config: &Config, file: &Path) -> anyhow::Result<()> {
    let document = load_document(file).await?;
    let profile = DocumentProfile::classify(&document.full_text, &config.classifier);

    let convention = &profile.convention;
    println!("\n{}", style("Spelling Convention").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Label:", style(convention.label).cyan());
    println!("{:<20} {:.2}", "Confidence:", convention.confidence);
    println!("{:<20} {:.1}", "US evidence:", convention.us_score);
    println!("{:<20} {:.1}", "UK evidence:", convention.uk_score);
    if !convention.evidence.is_empty() {
        println!("\n  {}", style("Evidence").dim());
        for e in convention.evidence.iter().take(MAX_EVIDENCE_SHOWN) {
            let side = match e.side {
                Side::Us => "US",
                Side::Uk => "UK",
            };
            println!("  {:<3} {:<20} {:?} ({:.0})", side, e.marker, e.family, e.weight);
        }
        if convention.evidence.len() > MAX_EVIDENCE_SHOWN {
            println!("  ... and {} more", convention.evidence.len() - MAX_EVIDENCE_SHOWN);
        }
    }

    let doc_type = &profile.doc_type;
    println!("\n{}", style("Document Type").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Label:", style(doc_type.label).cyan());
    println!("{:<20} {:.2}", "Confidence:", doc_type.confidence);
    for (label, score) in doc_type.scores.iter().filter(|(_, s)| *s > 0.0) {
        println!("  {:<18} {:.1}", label.as_str(), score);
    }
    if !doc_type.evidence.is_empty() {
        println!("\n  {}", style("Cues").dim());
        for e in doc_type.evidence.iter().take(MAX_EVIDENCE_SHOWN) {
            println!("  {:<10} {:<24} x{}", e.doc_type.as_str(), e.cue, e.count);
        }
    }

    Ok(())
}
