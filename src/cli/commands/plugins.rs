//! Plugin listing.

use console::style;

use crate::config::Config;
use crate::plugins::{build_plugins, BUILTIN_PLUGINS};

pub fn cmd_plugins(config: &Config) -> anyhow::Result<()> {
    let mut names: Vec<String> = BUILTIN_PLUGINS.iter().map(|s| s.to_string()).collect();
    names.extend(config.plugins.custom.iter().map(|c| c.name.clone()));
    let plugins = build_plugins(&names, &config.plugins.custom).map_err(anyhow::Error::msg)?;

    println!("\n{}", style("Plugins").bold());
    println!("{}", "-".repeat(60));
    for plugin in plugins {
        let enabled = config.plugins.enabled.iter().any(|n| n == plugin.name());
        let marker = if enabled {
            style("*").green().to_string()
        } else {
            " ".to_string()
        };
        let spec = plugin.routing_spec();
        println!(
            "{} {:<14} cost={:<5} priority={:<4} ambiguous={:?}",
            marker,
            style(plugin.name()).cyan(),
            spec.cost_tier.as_str(),
            plugin.priority(),
            spec.on_ambiguity
        );
        println!("    {}", spec.when_to_use);
        if !spec.keywords.is_empty() {
            println!("    keywords: {}", spec.keywords.join(", "));
        }
        if !spec.examples.is_empty() {
            println!("    {} routing example(s)", spec.examples.len());
        }
    }
    println!("\n{} = enabled", style("*").green());

    Ok(())
}
