//! `reagent onboard` — write a default config and create the data directories.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use reagent_core::config::{save_config, Config};
use reagent_core::utils::get_data_path;

/// Run the onboard command.
pub fn run(config_path: &Path) -> Result<()> {
    println!();
    println!("{}", "🧪 Reagent — Setup".cyan().bold());
    println!();

    write_default_config(config_path)?;

    let data_dir = get_data_path();
    for sub in ["sessions", "history", "artifacts"] {
        ensure_dir(&data_dir.join(sub))?;
    }

    println!();
    println!("  Add an API key under {} in the config,", "providers".bold());
    println!(
        "{}",
        "  then run `reagent agent` to start chatting.".green()
    );
    println!();

    Ok(())
}

/// Write `Config::default()` unless a file is already there. Returns whether it wrote.
fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        println!("  {} config already exists at {}", "✓".green(), path.display());
        return Ok(false);
    }
    save_config(&Config::default(), Some(path))
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("  {} created config at {}", "✓".green(), path.display());
    Ok(true)
}

fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    println!("  {} {}", "✓".green(), path.display());
    Ok(())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
