//! Config loader — reads `~/.reagent/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.reagent/config.json`
//! 3. Environment variables `REAGENT_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::schema::{Config, DispatchMode, ProviderConfig};

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the given path (or the default one) + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    apply_env_overrides(read_config_file(&config_path))
}

fn read_config_file(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config {}: {}", path.display(), e);
            Config::default()
        }
    }
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {key}: cannot parse {raw:?}");
            None
        }
    }
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `REAGENT_<SECTION>__<FIELD>` (double underscore as delimiter),
/// e.g. `REAGENT_AGENT__MODEL`, `REAGENT_PROVIDERS__OPENAI__API_KEY`,
/// `REAGENT_TOOLS__SEARCH__API_KEY`, `REAGENT_SERVER__PORT`.
pub fn apply_env_overrides(mut config: Config) -> Config {
    let agent = &mut config.agent;
    if let Ok(val) = std::env::var("REAGENT_AGENT__MODEL") {
        agent.model = val;
    }
    if let Some(n) = env_parse("REAGENT_AGENT__MAX_TOKENS") {
        agent.max_tokens = n;
    }
    if let Some(t) = env_parse("REAGENT_AGENT__TEMPERATURE") {
        agent.temperature = t;
    }
    if let Some(n) = env_parse("REAGENT_AGENT__MAX_TOOL_ITERATIONS") {
        agent.max_tool_iterations = n;
    }
    if let Some(n) = env_parse("REAGENT_AGENT__LLM_TIMEOUT_SECS") {
        agent.llm_timeout_secs = n;
    }
    if let Some(n) = env_parse("REAGENT_AGENT__TOOL_TIMEOUT_SECS") {
        agent.tool_timeout_secs = n;
    }
    if let Ok(val) = std::env::var("REAGENT_AGENT__DISPATCH") {
        match val.to_ascii_lowercase().as_str() {
            "sequential" => agent.dispatch = DispatchMode::Sequential,
            "concurrent" => agent.dispatch = DispatchMode::Concurrent,
            other => warn!("Ignoring REAGENT_AGENT__DISPATCH: unknown mode {other:?}"),
        }
    }
    if let Some(b) = env_bool("REAGENT_AGENT__PREFETCH") {
        agent.prefetch = b;
    }
    if let Ok(val) = std::env::var("REAGENT_AGENT__SYSTEM_PROMPT") {
        agent.system_prompt = Some(val);
    }

    let providers = &mut config.providers;
    apply_provider_env(&mut providers.openrouter, "OPENROUTER");
    apply_provider_env(&mut providers.openai, "OPENAI");
    apply_provider_env(&mut providers.anthropic, "ANTHROPIC");
    apply_provider_env(&mut providers.deepseek, "DEEPSEEK");
    apply_provider_env(&mut providers.groq, "GROQ");
    apply_provider_env(&mut providers.vllm, "VLLM");

    if let Ok(val) = std::env::var("REAGENT_TOOLS__CLOCK__UTC_OFFSET") {
        config.tools.clock.utc_offset = val;
    }
    if let Ok(val) = std::env::var("REAGENT_TOOLS__SEARCH__API_KEY") {
        config.tools.search.api_key = val;
    }
    if let Some(n) = env_parse("REAGENT_TOOLS__CRAWL__MAX_PAGES") {
        config.tools.crawl.max_pages = n;
    }

    if let Ok(val) = std::env::var("REAGENT_SERVER__HOST") {
        config.server.host = val;
    }
    if let Some(p) = env_parse("REAGENT_SERVER__PORT") {
        config.server.port = p;
    }

    config
}

/// Apply env var overrides for a single provider.
fn apply_provider_env(provider: &mut ProviderConfig, name: &str) {
    if let Ok(val) = std::env::var(format!("REAGENT_PROVIDERS__{name}__API_KEY")) {
        provider.api_key = val;
    }
    if let Ok(val) = std::env::var(format!("REAGENT_PROVIDERS__{name}__API_BASE")) {
        provider.api_base = Some(val);
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
