//! Configuration schema.
//!
//! Hierarchy: `Config` → `AgentConfig`, `ProvidersConfig`, `ToolsConfig`,
//! `ServerConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.reagent/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agent: AgentConfig,
    pub providers: ProvidersConfig,
    pub tools: ToolsConfig,
    pub server: ServerConfig,
}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// How tool calls parsed from one assistant message are executed.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One after another, in textual order.
    #[default]
    Sequential,
    /// All at once; results still come back in textual order.
    Concurrent,
}

/// Reasoning loop settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// LLM model identifier.
    pub model: String,
    /// Maximum tokens to generate per response.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    /// Dispatch rounds allowed before the forced answer.
    pub max_tool_iterations: u32,
    /// Upper bound on a single LLM call.
    pub llm_timeout_secs: u64,
    /// Upper bound on a single tool dispatch.
    pub tool_timeout_secs: u64,
    pub dispatch: DispatchMode,
    /// Run keyword-detected tools (time, news) before the first LLM call.
    pub prefetch: bool,
    /// Replaces the identity paragraph of the system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Name the agent introduces itself with.
    pub name: String,
    /// Number of session messages passed back in as prior history.
    pub history_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "openai/gpt-4o-mini".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            max_tool_iterations: 3,
            llm_timeout_secs: 60,
            tool_timeout_secs: 20,
            dispatch: DispatchMode::Sequential,
            prefetch: true,
            system_prompt: None,
            name: "Reagent".to_string(),
            history_limit: 20,
        }
    }
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Configuration for a single LLM provider (API key, base URL, headers).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Custom API base URL (overrides provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// All provider configurations, one per supported backend.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub openrouter: ProviderConfig,
    pub openai: ProviderConfig,
    pub anthropic: ProviderConfig,
    pub deepseek: ProviderConfig,
    pub groq: ProviderConfig,
    pub vllm: ProviderConfig,
}

impl ProvidersConfig {
    fn entries(&self) -> [(&'static str, &ProviderConfig); 6] {
        [
            ("openrouter", &self.openrouter),
            ("openai", &self.openai),
            ("anthropic", &self.anthropic),
            ("deepseek", &self.deepseek),
            ("groq", &self.groq),
            ("vllm", &self.vllm),
        ]
    }

    /// Get a provider config by name (e.g. `"openai"`).
    pub fn get_by_name(&self, name: &str) -> Option<&ProviderConfig> {
        self.entries()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| c)
    }

    /// Convert to a map for use with the provider registry.
    pub fn to_map(&self) -> HashMap<String, ProviderConfig> {
        self.entries()
            .into_iter()
            .map(|(name, config)| (name.to_string(), config.clone()))
            .collect()
    }
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

/// Settings for the built-in collaborators.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    pub clock: ClockConfig,
    pub web: WebConfig,
    pub search: SearchConfig,
    pub crawl: CrawlConfig,
    pub news: NewsConfig,
}

/// Clock collaborator settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClockConfig {
    /// Fixed offset from UTC, e.g. `"+02:00"`.
    pub utc_offset: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset: "+00:00".to_string(),
        }
    }
}

/// Shared HTTP settings for page fetching and crawling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebConfig {
    pub user_agent: String,
    /// Default cap on extracted page text.
    pub max_chars: usize,
    pub timeout_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; Reagent/0.1)".to_string(),
            max_chars: 20_000,
            timeout_secs: 15,
        }
    }
}

/// Web search (Brave Search API).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    pub api_key: String,
    pub max_results: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            max_results: 5,
        }
    }
}

/// Crawler limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlConfig {
    pub max_pages: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self { max_pages: 5 }
    }
}

/// RSS news sources, keyed by topic.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewsConfig {
    pub feeds: HashMap<String, Vec<String>>,
    pub max_articles: usize,
}

impl Default for NewsConfig {
    fn default() -> Self {
        let mut feeds = HashMap::new();
        feeds.insert(
            "general".to_string(),
            vec!["https://feeds.bbci.co.uk/news/rss.xml".to_string()],
        );
        feeds.insert(
            "tech".to_string(),
            vec!["https://feeds.bbci.co.uk/news/technology/rss.xml".to_string()],
        );
        feeds.insert(
            "business".to_string(),
            vec!["https://feeds.bbci.co.uk/news/business/rss.xml".to_string()],
        );
        feeds.insert(
            "science".to_string(),
            vec!["https://feeds.bbci.co.uk/news/science_and_environment/rss.xml".to_string()],
        );
        Self {
            feeds,
            max_articles: 5,
        }
    }
}

// ─────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────

/// HTTP surface for `reagent serve`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
