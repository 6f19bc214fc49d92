//! Shared helper functions for CLI commands.

use std::sync::Arc;

use console::style;

use crate::config::Config;
use crate::llm::{LlmClient, ReasoningService};
use crate::models::Importance;
use crate::plugins::{build_plugins, Plugin};

/// Truncate a string to at most `max_chars` characters, on one line.
pub fn truncate(s: &str, max_chars: usize) -> String {
    let flat: String = s
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Plugins named on the command line, or the configured set.
pub fn select_plugins(config: &Config, names: Option<&str>) -> anyhow::Result<Vec<Arc<dyn Plugin>>> {
    let names: Vec<String> = match names {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => config.plugins.enabled.clone(),
    };
    build_plugins(&names, &config.plugins.custom).map_err(anyhow::Error::msg)
}

/// Connect to the configured reasoning service, or `None` when disabled,
/// offline or unreachable.
pub async fn connect_service(config: &Config, offline: bool) -> anyhow::Result<Option<Arc<dyn ReasoningService>>> {
    if offline || !config.llm.enabled() {
        return Ok(None);
    }
    let client = LlmClient::new(config.llm.clone())?;
    if !client.is_available().await {
        eprintln!(
            "{} {}; running local checks only",
            style("!").yellow(),
            config.llm.availability_hint()
        );
        return Ok(None);
    }
    Ok(Some(Arc::new(client)))
}

pub fn styled_importance(importance: Importance) -> String {
    let label = format!("{:<8}", importance.as_str());
    match importance {
        Importance::Critical => style(label).red().bold().to_string(),
        Importance::High => style(label).red().to_string(),
        Importance::Medium => style(label).yellow().to_string(),
        Importance::Low => style(label).dim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("line one\nline two", 8), "line ...");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_select_plugins_from_list() {
        let config = Config::default();
        let plugins = select_plugins(&config, Some("math, spelling")).unwrap();
        let names: Vec<&str> = plugins.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["math", "spelling"]);
        assert!(select_plugins(&config, Some("grammar")).is_err());
    }
}
