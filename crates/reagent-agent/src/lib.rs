//! Reagent Agent — the reasoning loop, its tool plumbing, and built-in tools.
//!
//! This crate contains:
//! - **tools**: Collaborator trait, tool registry, and built-in collaborators
//!   (clock, browser, crawler, search, news)
//! - **parser**: Tool-call extraction from free-form assistant text
//! - **dispatcher**: Argument validation and collaborator invocation
//! - **conversation** / **context**: Message log and system prompt
//! - **intent** / **artifact**: Prefetch of obvious tools and HTML artifact extraction
//! - **agent_loop**: The LLM ↔ tool-calling main loop
//! - **metrics**: Per-run tool call statistics

pub mod agent_loop;
pub mod artifact;
pub mod context;
pub mod conversation;
pub mod dispatcher;
pub mod intent;
pub mod metrics;
pub mod parser;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use agent_loop::{AgentLoop, AgentSettings, LoopOutcome, Termination, FORCED_ANSWER_PROMPT};
pub use artifact::{ArtifactExtractor, HtmlArtifactExtractor};
pub use context::ContextBuilder;
pub use conversation::Conversation;
pub use dispatcher::{Dispatcher, ToolError, ToolResult};
pub use metrics::{ToolMetrics, ToolStats};
pub use parser::{parse_tool_calls, ParsedCall, ToolInvocation};
pub use tools::{builtin_registry, Collaborator, RegistryError, ToolDescriptor, ToolRegistry};
