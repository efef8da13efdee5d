//! `reagent sessions` — inspect and prune stored conversation logs.
//!
//! - `reagent sessions list` — stored sessions, most recent first
//! - `reagent sessions show <KEY> [-n N]` — the last N messages of a session
//! - `reagent sessions clear <KEY>` — drop a session's messages, keep the file
//! - `reagent sessions delete <KEY>` — remove a session file

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use reagent_core::session::SessionStore;
use reagent_core::types::Role;
use reagent_core::utils::truncate_string;

/// Characters of each message shown by `show`.
const PREVIEW_CHARS: usize = 160;

/// Sessions subcommands.
#[derive(Subcommand)]
pub enum SessionsCommands {
    /// List stored sessions
    List,

    /// Print the latest messages of a session
    Show {
        /// Session key (e.g. "cli:default")
        key: String,

        /// Number of messages to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Remove all messages from a session
    Clear {
        /// Session key
        key: String,
    },

    /// Delete a session file
    Delete {
        /// Session key
        key: String,
    },
}

/// Dispatch a sessions subcommand.
pub fn dispatch(cmd: SessionsCommands) -> Result<()> {
    let store = SessionStore::open(None).context("failed to open session store")?;
    match cmd {
        SessionsCommands::List => list_sessions(&store),
        SessionsCommands::Show { key, limit } => show_session(&store, &key, limit),
        SessionsCommands::Clear { key } => {
            store.clear(&key);
            println!("  {} cleared {key}", "✓".green());
        }
        SessionsCommands::Delete { key } => {
            if store.delete(&key) {
                println!("  {} deleted {key}", "✓".green());
            } else {
                println!("  No session file for {key}.");
            }
        }
    }
    Ok(())
}

fn list_sessions(store: &SessionStore) {
    let sessions = store.list();
    if sessions.is_empty() {
        println!("  No sessions in {}.", store.dir().display());
        return;
    }

    println!();
    println!(
        "  {:<28} {:>8}  {}",
        "Session".bold(),
        "Messages".bold(),
        "Updated".bold()
    );
    println!("  {}", "─".repeat(60));
    for s in &sessions {
        println!(
            "  {:<28} {:>8}  {}",
            s.key,
            s.message_count,
            s.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
}

fn show_session(store: &SessionStore, key: &str, limit: usize) {
    let messages = store.history(key, limit);
    if messages.is_empty() {
        println!("  Session {key} is empty.");
        return;
    }

    println!();
    for message in &messages {
        let who = match message.role {
            Role::User => "you".green(),
            Role::Assistant => "reagent".cyan(),
            Role::System | Role::Tool => message.role.as_str().dimmed(),
        };
        println!(
            "  {:>8}  {}",
            who.bold(),
            truncate_string(&message.content.replace('\n', " "), PREVIEW_CHARS)
        );
    }
    println!();
}
