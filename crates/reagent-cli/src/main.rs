//! Reagent CLI — entry point.
//!
//! # Commands
//!
//! - `reagent agent [-m MESSAGE] [-s SESSION]` — chat (single-shot or REPL)
//! - `reagent serve [--host H] [--port P]` — HTTP API
//! - `reagent tools` — list the tool catalogue
//! - `reagent sessions ...` — inspect stored sessions
//! - `reagent status` — show configuration and provider status
//! - `reagent onboard` — write a default config

mod chat;
mod helpers;
mod onboard;
mod repl;
mod serve;
mod sessions_cmd;
mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use reagent_agent::builtin_registry;
use reagent_core::config::{get_config_path, load_config, Config};

use crate::chat::ChatService;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 🧪 Reagent — a tool-calling reasoning agent
#[derive(Parser)]
#[command(name = "reagent", version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.reagent/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent (single-shot or interactive REPL)
    Agent {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Session identifier (format: "channel:id")
        #[arg(short, long, default_value = "cli:default")]
        session: String,

        /// Print the full outcome as JSON (single-shot only)
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Override agent.maxToolIterations
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Serve the agent over HTTP
    Serve {
        /// Bind address (default: server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port (default: server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// List the tools the agent can call
    Tools,

    /// Inspect stored sessions
    Sessions {
        #[command(subcommand)]
        action: sessions_cmd::SessionsCommands,
    },

    /// Show configuration and provider status
    Status,

    /// Write a default config and create data directories
    Onboard,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(get_config_path);

    match cli.command {
        Commands::Agent {
            message,
            session,
            json,
            max_iterations,
            logs,
        } => {
            init_logging(logs);
            let mut config = load_config(Some(&config_path));
            if let Some(n) = max_iterations {
                config.agent.max_tool_iterations = n;
            }
            run_agent(&config, message, session, json, logs).await
        }
        Commands::Serve { host, port, logs } => {
            init_logging(logs);
            serve::run(load_config(Some(&config_path)), host, port).await
        }
        Commands::Tools => list_tools(&load_config(Some(&config_path))),
        Commands::Sessions { action } => sessions_cmd::dispatch(action),
        Commands::Status => status::run(&load_config(Some(&config_path)), &config_path),
        Commands::Onboard => onboard::run(&config_path),
    }
}

// ─────────────────────────────────────────────
// Agent command
// ─────────────────────────────────────────────

async fn run_agent(
    config: &Config,
    message: Option<String>,
    session_id: String,
    json: bool,
    show_logs: bool,
) -> Result<()> {
    let chat = ChatService::from_config(config)?;

    match message {
        Some(msg) => {
            info!(session = %session_id, "processing single message");
            let cancel = CancellationToken::new();
            let signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal.cancel();
                }
            });

            let outcome = chat.respond(Some(&session_id), &msg, &cancel).await;
            if json {
                helpers::print_outcome_json(&outcome)?;
            } else {
                helpers::print_outcome(&outcome, &session_id);
            }
        }
        None => repl::run(chat, &session_id, show_logs).await?,
    }

    Ok(())
}

// ─────────────────────────────────────────────
// Tools command
// ─────────────────────────────────────────────

fn list_tools(config: &Config) -> Result<()> {
    let registry = builtin_registry(&config.tools).context("invalid tools configuration")?;

    println!();
    println!("{}", "🧪 Reagent Tools".cyan().bold());
    println!();
    for descriptor in registry.descriptors() {
        println!("  {}", descriptor.signature().bold());
        println!(
            "      {}  {}",
            descriptor.qualified_name().dimmed(),
            descriptor.description
        );
    }
    println!();
    Ok(())
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("reagent=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
