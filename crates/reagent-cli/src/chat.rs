//! Session-aware front for the reasoning loop, shared by the REPL, single-shot
//! mode and the HTTP server.
//!
//! Prior history comes from the session store; the user message and the final
//! answer are appended back once a run produces an answer.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use reagent_agent::{builtin_registry, AgentLoop, AgentSettings, LoopOutcome, Termination};
use reagent_core::config::Config;
use reagent_core::session::SessionStore;
use reagent_core::types::Message;
use reagent_providers::create_provider;

pub struct ChatService {
    agent: AgentLoop,
    sessions: SessionStore,
    history_limit: usize,
}

impl ChatService {
    pub fn new(agent: AgentLoop, sessions: SessionStore, history_limit: usize) -> Self {
        Self {
            agent,
            sessions,
            history_limit,
        }
    }

    /// Provider, built-in tools and session store, all from the loaded config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let agent = build_agent_loop(config)?;
        let sessions = SessionStore::open(None).context("failed to open session store")?;
        Ok(Self::new(agent, sessions, config.agent.history_limit))
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Run one request. Without a session key the run starts from empty history
    /// and nothing is recorded.
    pub async fn respond(
        &self,
        session_key: Option<&str>,
        input: &str,
        cancel: &CancellationToken,
    ) -> LoopOutcome {
        let history = session_key
            .map(|key| self.sessions.history(key, self.history_limit))
            .unwrap_or_default();

        let outcome = self.agent.run_with_cancel(input, &history, cancel).await;

        if let Some(key) = session_key {
            if records_exchange(outcome.termination) {
                self.sessions.append(
                    key,
                    [
                        Message::user(input),
                        Message::assistant(outcome.final_text.clone()),
                    ],
                );
            } else {
                debug!(session = key, termination = outcome.termination.as_str(), "exchange not recorded");
            }
        }

        outcome
    }
}

/// Failed and cancelled runs stay out of the log so the next run does not see
/// an error string as something the assistant said.
fn records_exchange(termination: Termination) -> bool {
    matches!(termination, Termination::Answered | Termination::ForcedAnswer)
}

/// Build an `AgentLoop` from the loaded configuration.
pub fn build_agent_loop(config: &Config) -> Result<AgentLoop> {
    let provider = create_provider(&config.agent.model, &config.providers.to_map())
        .context("failed to create LLM provider")?;
    let registry = builtin_registry(&config.tools).context("invalid tools configuration")?;

    Ok(AgentLoop::new(
        Arc::new(provider),
        Arc::new(registry),
        AgentSettings::from_config(&config.agent),
    ))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
