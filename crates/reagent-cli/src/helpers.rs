//! Shared CLI helpers — outcome printing, artifact files, version banner.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use reagent_agent::{LoopOutcome, Termination};
use reagent_core::utils::{get_data_path, safe_filename};

/// Print a loop outcome to stdout, saving any artifact under `~/.reagent/artifacts/`.
pub fn print_outcome(outcome: &LoopOutcome, session_id: &str) {
    println!();
    println!("{}", "🧪 Reagent".cyan().bold());
    if outcome.final_text.is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        match outcome.termination {
            Termination::ProviderFailed => println!("{}", outcome.final_text.red()),
            Termination::Cancelled => println!("{}", outcome.final_text.yellow()),
            _ => println!("{}", outcome.final_text),
        }
    }

    if let Some(note) = termination_note(outcome) {
        println!("{}", note.dimmed());
    }
    if !outcome.tool_metrics.is_empty() {
        println!("{}", format!("tools: {}", outcome.tool_metrics).dimmed());
    }

    if let Some(html) = &outcome.artifact {
        match save_artifact(&artifacts_dir(), session_id, html) {
            Ok(path) => println!("{} {}", "artifact saved to".dimmed(), path.display()),
            Err(e) => eprintln!("❌ Could not save artifact: {e:#}"),
        }
    }
    println!();
}

/// Print the outcome as one JSON object (for scripting).
pub fn print_outcome_json(outcome: &LoopOutcome) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

fn termination_note(outcome: &LoopOutcome) -> Option<String> {
    match outcome.termination {
        Termination::ForcedAnswer => Some(format!(
            "(answer forced after {} tool rounds)",
            outcome.iterations_used
        )),
        Termination::Answered if outcome.iterations_used > 0 => Some(format!(
            "({} tool round{})",
            outcome.iterations_used,
            if outcome.iterations_used == 1 { "" } else { "s" }
        )),
        _ => None,
    }
}

fn artifacts_dir() -> PathBuf {
    get_data_path().join("artifacts")
}

/// Write an artifact as `<session>-<timestamp>.html` inside `dir`.
pub fn save_artifact(dir: &Path, session_id: &str, html: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("{}-{stamp}.html", safe_filename(session_id)));
    std::fs::write(&path, html).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Print the banner shown at REPL and server start.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "🧪 Reagent".cyan().bold(), version.dimmed());
    println!();
}

/// Print a "thinking" placeholder (for non-log mode).
pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

/// Clear the "thinking" placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
