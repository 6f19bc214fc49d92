//! Reasoning service status.

use console::style;

use crate::config::Config;
use crate::llm::LlmClient;

pub async fn cmd_llm(config: &Config) -> anyhow::Result<()> {
    let llm = &config.llm;
    let client = LlmClient::new(llm.clone())?;

    println!("\n{}", style("Reasoning Service").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Enabled:", if llm.enabled() { "Yes" } else { "No" });
    println!("{:<20} {}", "Provider:", llm.provider_name());
    println!("{:<20} {}", "Endpoint:", llm.endpoint());
    println!("{:<20} {}", "Current Model:", llm.model());
    println!("{:<20} {}", "API Key:", if llm.api_key().is_some() { "set" } else { "not set" });
    println!("{:<20} {}", "Max Tokens:", llm.max_tokens());
    println!("{:<20} {:.2}", "Temperature:", llm.temperature());

    if !client.is_available().await {
        println!("\n{} {}", style("!").yellow(), llm.availability_hint());
        return Ok(());
    }

    println!("\n{}", style("Available Models").bold());
    println!("{}", "-".repeat(40));

    match client.list_models().await {
        Ok(models) => {
            if models.is_empty() {
                println!("  No models available");
            } else {
                for model in models {
                    let marker = if model == llm.model() {
                        style("*").green().to_string()
                    } else {
                        " ".to_string()
                    };
                    println!("{} {}", marker, model);
                }
            }
        }
        Err(e) => {
            println!("{} Failed to list models: {}", style("✗").red(), e);
        }
    }

    Ok(())
}
