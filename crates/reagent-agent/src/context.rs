//! Context builder — constructs the system prompt for the reasoning loop.
//!
//! The prompt has three parts joined by `---` separators: an identity block
//! (or the configured override), the tool catalogue rendered from the
//! registry, and the calling conventions the parser understands.

use chrono::Utc;

use crate::tools::ToolRegistry;

/// Builds system prompts for the reasoning loop.
#[derive(Clone, Debug)]
pub struct ContextBuilder {
    /// Agent identity name (for the system prompt).
    agent_name: String,
    /// Replaces the identity block when set.
    system_prompt: Option<String>,
}

impl ContextBuilder {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            system_prompt: None,
        }
    }

    /// Use a custom identity paragraph (builder pattern).
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    /// Build the full system prompt.
    pub fn build_system_prompt(&self, registry: &ToolRegistry) -> String {
        let mut parts: Vec<String> = Vec::new();

        // 1) Identity
        parts.push(match &self.system_prompt {
            Some(custom) => custom.clone(),
            None => self.build_identity(),
        });

        // 2) Tools
        if registry.is_empty() {
            parts.push("# Tools\n\nNo tools are available. Answer from your own knowledge.".into());
        } else {
            parts.push(format!("# Tools\n\n{}", registry.describe()));
            // 3) Calling conventions
            parts.push(TOOL_CONVENTIONS.to_string());
        }

        parts.join("\n\n---\n\n")
    }

    /// Core identity block.
    fn build_identity(&self) -> String {
        let now = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        format!(
            "# Identity\n\n\
             You are **{name}**, an AI assistant.\n\n\
             - **Date/time**: {now}\n\n\
             Use tools when a question needs fresh or external information \
             (the time, news, web pages, search results). \
             Answer directly when you already know the answer. Be concise and helpful.\n\n\
             To hand the user a web page, put `text/html` on its own line followed by a \
             complete HTML document.",
            name = self.agent_name,
        )
    }
}

const TOOL_CONVENTIONS: &str = "# Calling tools\n\n\
To call a tool, write a block like this and stop:\n\n\
<tool>get-time</tool><args>{}</args>\n\n\
or, equivalently:\n\n\
Action: browse-url\n\
Args: {\"url\": \"https://example.com\"}\n\n\
Arguments are a JSON object. You may call several tools in one reply; \
each result comes back in a message starting with `[tool result]`. \
When you have what you need, reply with the final answer and no tool blocks.";
