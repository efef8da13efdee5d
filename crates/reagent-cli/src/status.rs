//! `reagent status` — show configuration, provider and tool status.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use reagent_core::config::Config;
use reagent_core::session::SessionStore;
use reagent_providers::PROVIDERS;

fn mark(ok: bool, missing: &str) -> String {
    if ok {
        "✓".green().to_string()
    } else {
        missing.red().to_string()
    }
}

fn key_status(key: &str) -> String {
    if key.is_empty() {
        format!("{}", "· not configured".dimmed())
    } else {
        format!("{} (key set)", "✓".green())
    }
}

/// Run the status command.
pub fn run(config: &Config, config_path: &Path) -> Result<()> {
    let agent = &config.agent;

    println!();
    println!("{}", "🧪 Reagent Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        mark(config_path.exists(), "(not found, using defaults)")
    );
    println!("  {:<18} {}", "Model:".bold(), agent.model);
    println!(
        "  {:<18} {} | max_tokens: {}",
        "Parameters:".bold(),
        format!("temp: {}", agent.temperature).dimmed(),
        format!("{}", agent.max_tokens).dimmed(),
    );
    println!(
        "  {:<18} {} rounds | {:?} dispatch | prefetch {}",
        "Loop:".bold(),
        agent.max_tool_iterations,
        agent.dispatch,
        if agent.prefetch { "on" } else { "off" },
    );
    println!(
        "  {:<18} llm {}s | tool {}s",
        "Timeouts:".bold(),
        agent.llm_timeout_secs,
        agent.tool_timeout_secs
    );

    println!();
    println!("  {}", "Providers:".bold());
    let providers_map = config.providers.to_map();
    for spec in PROVIDERS {
        let status = match providers_map.get(spec.name) {
            Some(p) if p.is_configured() => format!("{} (key set)", "✓".green()),
            Some(p) if spec.is_local && p.api_base.is_some() => {
                format!("{} (local endpoint)", "✓".green())
            }
            _ => format!("{}", "· not configured".dimmed()),
        };
        println!("    {:<20} {}", spec.display_name, status);
    }

    let tools = &config.tools;
    println!();
    println!("  {}", "Tools:".bold());
    println!("    {:<20} {}", "Brave Search", key_status(&tools.search.api_key));
    println!("    {:<20} UTC offset {}", "Clock", tools.clock.utc_offset);
    let mut groups: Vec<&str> = tools.news.feeds.keys().map(String::as_str).collect();
    groups.sort_unstable();
    println!("    {:<20} {}", "News feed groups", groups.join(", "));

    println!();
    match SessionStore::open(None) {
        Ok(store) => println!(
            "  {:<18} {} in {}",
            "Sessions:".bold(),
            store.list().len(),
            store.dir().display()
        ),
        Err(e) => println!("  {:<18} {}", "Sessions:".bold(), format!("unavailable ({e})").red()),
    }
    println!(
        "  {:<18} http://{}:{}",
        "Server:".bold(),
        config.server.host,
        config.server.port
    );
    println!();

    Ok(())
}
