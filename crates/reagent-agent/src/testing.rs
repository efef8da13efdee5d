//! Shared test doubles: a scripted LLM provider and a collaborator with
//! predictable operations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use reagent_core::types::Message;
use reagent_providers::{LlmProvider, LlmRequestConfig, ProviderError};

use crate::tools::base::{
    optional_i64, optional_string, require_string, Arguments, Collaborator, ParamKind, ParamSpec,
    ToolDescriptor,
};
use crate::tools::ToolRegistry;

// ─────────────────────────────────────────────
// ScriptedProvider
// ─────────────────────────────────────────────

/// Returns canned replies in order and records every conversation it was sent.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    seen: Mutex<Vec<Vec<Message>>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn with_results(replies: impl IntoIterator<Item = Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// A provider that keeps asking for `tool_id` forever.
    pub fn always_calling(tool_id: &str) -> Self {
        let reply = format!("<tool>{tool_id}</tool><args>{{\"text\": \"again\"}}</args>");
        Self::new(std::iter::repeat(reply).take(64))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// The conversation sent on the `n`th call (0-based).
    pub fn request(&self, n: usize) -> Vec<Message> {
        self.seen.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: &[Message],
        _model: &str,
        _config: &LlmRequestConfig,
    ) -> Result<String, ProviderError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("(script exhausted)".to_string()))
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    fn display_name(&self) -> &str {
        "Scripted"
    }
}

// ─────────────────────────────────────────────
// EchoCollaborator
// ─────────────────────────────────────────────

/// Collaborator named `test` whose operations echo, add, fail, stall or panic.
#[derive(Default)]
pub struct EchoCollaborator {
    invocations: AtomicUsize,
}

impl EchoCollaborator {
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collaborator for EchoCollaborator {
    fn name(&self) -> &str {
        "test"
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new("echo", "test", "echo", "Echo the text back")
                .param(ParamSpec::required("text", ParamKind::String, "Text to echo")),
            ToolDescriptor::new("fail", "test", "fail", "Always fails"),
            ToolDescriptor::new("add-numbers", "test", "add", "Add two integers")
                .param(ParamSpec::required("a", ParamKind::Integer, "First"))
                .param(ParamSpec::required("b", ParamKind::Integer, "Second")),
            ToolDescriptor::new("flag", "test", "flag", "Report a boolean")
                .param(ParamSpec::required("on", ParamKind::Boolean, "Switch")),
            ToolDescriptor::new("slow", "test", "slow", "Sleep before answering")
                .param(ParamSpec::optional("ms", ParamKind::Integer, "Delay")),
            ToolDescriptor::new("explode", "test", "panic", "Panics"),
            ToolDescriptor::new("get-time", "test", "get_time", "Fixed clock"),
            ToolDescriptor::new("get-news", "test", "get_news", "Canned headlines")
                .param(ParamSpec::optional("topic", ParamKind::String, "Topic")),
            ToolDescriptor::new("browse-url", "test", "browse", "Always times out")
                .param(ParamSpec::required("url", ParamKind::String, "URL")),
        ]
    }

    async fn invoke(&self, operation: &str, args: &Arguments) -> anyhow::Result<String> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match operation {
            "echo" => require_string(args, "text"),
            "fail" => anyhow::bail!("intentional failure"),
            "add" => {
                let a = optional_i64(args, "a").unwrap_or_default();
                let b = optional_i64(args, "b").unwrap_or_default();
                Ok((a + b).to_string())
            }
            "flag" => Ok(format!("on={}", args["on"])),
            "slow" => {
                let ms = optional_i64(args, "ms").unwrap_or(5_000) as u64;
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok("done".to_string())
            }
            "panic" => panic!("collaborator blew up"),
            "get_time" => Ok("12:00".to_string()),
            "get_news" => Ok(format!(
                "headlines about {}",
                optional_string(args, "topic").unwrap_or_else(|| "general".into())
            )),
            "browse" => anyhow::bail!("timeout"),
            other => Err(crate::tools::base::unknown_operation("test", other)),
        }
    }
}

/// Registry holding one `EchoCollaborator`, plus a handle to it.
pub fn echo_registry() -> (Arc<ToolRegistry>, Arc<EchoCollaborator>) {
    let collaborator = Arc::new(EchoCollaborator::default());
    let mut registry = ToolRegistry::new();
    registry
        .install(collaborator.clone())
        .expect("echo collaborator installs cleanly");
    (Arc::new(registry), collaborator)
}
