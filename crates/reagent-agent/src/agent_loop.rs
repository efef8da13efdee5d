//! Agent loop — the LLM ↔ tool-calling reasoning loop.
//!
//! One call to [`AgentLoop::run`] handles one user request:
//!
//! ```text
//!  Running ──(no tool calls)──────────────────────────────► Done(Answered)
//!    │  ▲
//!    │  └─(dispatch round, iterations < max)
//!    └────(dispatch round, iterations == max)──► AwaitingForcedAnswer
//!                                                   │
//!                                   (one more call) └──► Done(ForcedAnswer)
//! ```
//!
//! A provider failure or LLM timeout ends the run as `ProviderFailed`;
//! cancellation is honoured before every LLM call and every dispatch round.
//! The loop never issues more than `max_iterations + 1` LLM calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use reagent_core::config::schema::AgentConfig;
use reagent_core::config::DispatchMode;
use reagent_core::types::Message;
use reagent_providers::traits::{LlmProvider, LlmRequestConfig};

use crate::artifact::{ArtifactExtractor, HtmlArtifactExtractor};
use crate::context::ContextBuilder;
use crate::conversation::Conversation;
use crate::dispatcher::{Dispatcher, ToolResult};
use crate::intent;
use crate::metrics::ToolMetrics;
use crate::parser::parse_tool_calls;
use crate::tools::ToolRegistry;

/// Appended as a user message once the iteration cap is reached.
pub const FORCED_ANSWER_PROMPT: &str = "You have reached the tool-call limit for this request. \
Answer the user's question now using the information gathered above. \
Do not request any more tools.";

// ─────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct AgentSettings {
    pub model: String,
    pub request: LlmRequestConfig,
    /// Dispatch rounds allowed before the forced answer. Always ≥ 1.
    pub max_iterations: usize,
    pub llm_timeout: Duration,
    pub tool_timeout: Duration,
    pub dispatch_mode: DispatchMode,
    /// Run obvious tools (time, news) before the first LLM call.
    pub prefetch: bool,
    pub system_prompt: Option<String>,
    pub agent_name: String,
}

impl AgentSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            request: LlmRequestConfig {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            },
            max_iterations: (config.max_tool_iterations as usize).max(1),
            llm_timeout: Duration::from_secs(config.llm_timeout_secs.max(1)),
            tool_timeout: Duration::from_secs(config.tool_timeout_secs.max(1)),
            dispatch_mode: config.dispatch,
            prefetch: config.prefetch,
            system_prompt: config.system_prompt.clone(),
            agent_name: config.name.clone(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

// ─────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model replied without requesting tools.
    Answered,
    /// The iteration cap was hit; the forced reply is passed through as-is.
    ForcedAnswer,
    /// The LLM call failed or timed out.
    ProviderFailed,
    Cancelled,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::Answered => "answered",
            Termination::ForcedAnswer => "forced_answer",
            Termination::ProviderFailed => "provider_failed",
            Termination::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoopOutcome {
    pub final_text: String,
    /// Completed dispatch rounds (prefetch not included).
    pub iterations_used: usize,
    pub artifact: Option<String>,
    pub termination: Termination,
    /// Every tool dispatched during the run, prefetch included.
    pub tool_metrics: ToolMetrics,
}

enum LoopState {
    Running,
    AwaitingForcedAnswer,
    Done(LoopOutcome),
}

// ─────────────────────────────────────────────
// AgentLoop
// ─────────────────────────────────────────────

pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    dispatcher: Dispatcher,
    context: ContextBuilder,
    artifacts: Option<Arc<dyn ArtifactExtractor>>,
    settings: AgentSettings,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: Arc<ToolRegistry>,
        settings: AgentSettings,
    ) -> Self {
        let mut settings = settings;
        settings.max_iterations = settings.max_iterations.max(1);
        let dispatcher = Dispatcher::new(registry.clone(), settings.tool_timeout);
        let context = ContextBuilder::new(&settings.agent_name)
            .with_system_prompt(settings.system_prompt.clone());

        info!(
            model = %settings.model,
            provider = provider.display_name(),
            tools = registry.len(),
            max_iterations = settings.max_iterations,
            "agent loop initialized"
        );

        Self {
            provider,
            registry,
            dispatcher,
            context,
            artifacts: Some(Arc::new(HtmlArtifactExtractor)),
            settings,
        }
    }

    /// Replace (or with `None`, disable) artifact extraction.
    pub fn with_artifact_extractor(mut self, extractor: Option<Arc<dyn ArtifactExtractor>>) -> Self {
        self.artifacts = extractor;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// The system prompt a run starts with.
    pub fn system_prompt(&self) -> String {
        self.context.build_system_prompt(&self.registry)
    }

    /// Handle one user request.
    pub async fn run(&self, user_message: &str, prior_history: &[Message]) -> LoopOutcome {
        self.run_with_cancel(user_message, prior_history, &CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), stopping at the next safe point once `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        user_message: &str,
        prior_history: &[Message],
        cancel: &CancellationToken,
    ) -> LoopOutcome {
        let started = Instant::now();
        let mut conversation =
            Conversation::seeded(&self.system_prompt(), prior_history, user_message);
        let mut iterations = 0usize;
        let mut metrics = ToolMetrics::new();

        info!(
            model = %self.settings.model,
            history = prior_history.len(),
            "reasoning loop started"
        );

        if self.settings.prefetch && !cancel.is_cancelled() {
            self.prefetch(user_message, &mut conversation, &mut metrics)
                .await;
        }

        let mut state = LoopState::Running;
        let mut outcome = loop {
            state = match state {
                LoopState::Running => {
                    self.step(&mut conversation, &mut iterations, &mut metrics, cancel)
                        .await
                }
                LoopState::AwaitingForcedAnswer => {
                    if cancel.is_cancelled() {
                        LoopState::Done(self.cancelled(iterations))
                    } else {
                        debug!(iteration = iterations, "requesting forced answer");
                        match self.complete(&conversation).await {
                            Ok(reply) => {
                                conversation.push(Message::assistant(reply.clone()));
                                LoopState::Done(self.finish(
                                    reply,
                                    iterations,
                                    Termination::ForcedAnswer,
                                ))
                            }
                            Err(reason) => LoopState::Done(self.failed(reason, iterations)),
                        }
                    }
                }
                LoopState::Done(outcome) => break outcome,
            };
        };

        outcome.tool_metrics = metrics;

        info!(
            termination = outcome.termination.as_str(),
            iterations = outcome.iterations_used,
            artifact = outcome.artifact.is_some(),
            tool_calls = outcome.tool_metrics.total_calls(),
            tool_failures = outcome.tool_metrics.total_failures(),
            tool_ms = outcome.tool_metrics.total_time().as_millis() as u64,
            tools = %outcome.tool_metrics,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reasoning loop finished"
        );
        outcome
    }

    /// One `Running` transition: LLM call, parse, and at most one dispatch round.
    async fn step(
        &self,
        conversation: &mut Conversation,
        iterations: &mut usize,
        metrics: &mut ToolMetrics,
        cancel: &CancellationToken,
    ) -> LoopState {
        if cancel.is_cancelled() {
            return LoopState::Done(self.cancelled(*iterations));
        }

        debug!(iteration = *iterations + 1, "LLM call");
        let reply = match self.complete(conversation).await {
            Ok(reply) => reply,
            Err(reason) => return LoopState::Done(self.failed(reason, *iterations)),
        };

        let calls = parse_tool_calls(&reply);
        // Keep the model's reasoning ahead of the results it asked for.
        conversation.push(Message::assistant(reply.clone()));

        if calls.is_empty() {
            return LoopState::Done(self.finish(reply, *iterations, Termination::Answered));
        }
        if cancel.is_cancelled() {
            return LoopState::Done(self.cancelled(*iterations));
        }

        *iterations += 1;
        debug!(iteration = *iterations, calls = calls.len(), "dispatching tool calls");
        let results = self
            .dispatcher
            .dispatch_all(&calls, self.settings.dispatch_mode)
            .await;
        metrics.record_all(&results);
        conversation.extend(results.iter().map(ToolResult::to_message));

        if *iterations >= self.settings.max_iterations {
            info!(iterations = *iterations, "iteration cap reached, forcing an answer");
            conversation.push(Message::user(FORCED_ANSWER_PROMPT));
            LoopState::AwaitingForcedAnswer
        } else {
            LoopState::Running
        }
    }

    /// Dispatch the tool an obvious question needs before the model sees it.
    async fn prefetch(
        &self,
        user_message: &str,
        conversation: &mut Conversation,
        metrics: &mut ToolMetrics,
    ) {
        let Some(invocation) = intent::detect(user_message) else {
            return;
        };
        if !self.registry.has(&invocation.tool_id) {
            debug!(tool = %invocation.tool_id, "prefetch skipped, tool not registered");
            return;
        }
        info!(tool = %invocation.tool_id, "prefetching");
        let result = self.dispatcher.dispatch_invocation(&invocation).await;
        metrics.record(&result);
        conversation.push(result.to_message());
    }

    async fn complete(&self, conversation: &Conversation) -> Result<String, String> {
        let call = self.provider.complete(
            conversation.messages(),
            &self.settings.model,
            &self.settings.request,
        );
        match tokio::time::timeout(self.settings.llm_timeout, call).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(format!("LLM provider call failed: {e}")),
            Err(_) => Err(format!(
                "LLM call timed out after {}s",
                self.settings.llm_timeout.as_secs_f64()
            )),
        }
    }

    fn finish(&self, text: String, iterations: usize, termination: Termination) -> LoopOutcome {
        let artifact = self.artifacts.as_ref().and_then(|a| a.extract(&text));
        LoopOutcome {
            final_text: text,
            iterations_used: iterations,
            artifact,
            termination,
            tool_metrics: ToolMetrics::default(),
        }
    }

    fn failed(&self, reason: String, iterations: usize) -> LoopOutcome {
        error!(error = %reason, iterations, "reasoning loop aborted");
        LoopOutcome {
            final_text: reason,
            iterations_used: iterations,
            artifact: None,
            termination: Termination::ProviderFailed,
            tool_metrics: ToolMetrics::default(),
        }
    }

    fn cancelled(&self, iterations: usize) -> LoopOutcome {
        info!(iterations, "reasoning loop cancelled");
        LoopOutcome {
            final_text: "Request cancelled.".into(),
            iterations_used: iterations,
            artifact: None,
            termination: Termination::Cancelled,
            tool_metrics: ToolMetrics::default(),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
