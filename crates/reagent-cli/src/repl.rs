//! Interactive REPL.
//!
//! Uses `rustyline` for readline-style editing with persistent history.
//! Ctrl+C while a request is running cancels that request; at the prompt it exits.

use anyhow::Result;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::chat::ChatService;
use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// Clears the current session's history.
const RESET_COMMANDS: &[&str] = &["/reset", "/clear"];

/// Run the interactive REPL loop.
pub async fn run(chat: ChatService, session_id: &str, show_logs: bool) -> Result<()> {
    helpers::print_banner();
    println!(
        "  Session {} · model {} · {} tools",
        session_id,
        chat.agent().model(),
        chat.agent().registry().len()
    );
    println!("  Type a message, \"/reset\" to forget the session, or \"exit\" to quit.");
    println!();

    let mut editor = create_editor()?;

    loop {
        let input = match editor.readline("You: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => break,
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        if matches_command(EXIT_COMMANDS, trimmed) {
            println!("\nGoodbye! 👋");
            break;
        }

        let _ = editor.add_history_entry(&input);

        if matches_command(RESET_COMMANDS, trimmed) {
            chat.sessions().clear(session_id);
            println!("  Session {session_id} cleared.\n");
            continue;
        }

        debug!(session = session_id, input = trimmed, "processing input");
        if !show_logs {
            helpers::print_thinking();
        }

        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let outcome = chat.respond(Some(session_id), trimmed, &cancel).await;
        watcher.abort();

        if !show_logs {
            helpers::clear_thinking();
        }
        helpers::print_outcome(&outcome, session_id);
    }

    save_history(&mut editor);

    Ok(())
}

/// Create a rustyline editor with history.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

/// Save history to disk.
fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

/// Path to the history file.
fn history_path() -> std::path::PathBuf {
    reagent_core::utils::get_data_path()
        .join("history")
        .join("cli_history")
}

fn matches_command(commands: &[&str], input: &str) -> bool {
    let lower = input.to_lowercase();
    commands.contains(&lower.as_str())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_commands() {
        assert!(matches_command(EXIT_COMMANDS, "exit"));
        assert!(matches_command(EXIT_COMMANDS, "EXIT"));
        assert!(matches_command(EXIT_COMMANDS, "/quit"));
        assert!(matches_command(EXIT_COMMANDS, ":q"));
        assert!(!matches_command(EXIT_COMMANDS, "hello"));
        assert!(!matches_command(EXIT_COMMANDS, ""));
    }

    #[test]
    fn reset_commands() {
        assert!(matches_command(RESET_COMMANDS, "/reset"));
        assert!(matches_command(RESET_COMMANDS, "/CLEAR"));
        assert!(!matches_command(RESET_COMMANDS, "reset the clock"));
    }

    #[test]
    fn history_path_under_data_dir() {
        let path = history_path();
        assert!(path.to_string_lossy().contains(".reagent"));
        assert!(path.to_string_lossy().contains("cli_history"));
    }
}
