//! Provider registry — static specs for the supported OpenAI-compatible backends.
//!
//! Each `ProviderSpec` describes how to reach a provider: keywords for model
//! matching, the env var people usually keep its key in, and the API base.

use std::collections::HashMap;

/// Provider config lives in core; re-exported here.
pub use reagent_core::config::schema::ProviderConfig;

// ─────────────────────────────────────────────
// ProviderSpec — static metadata for one provider
// ─────────────────────────────────────────────

/// Static specification describing one LLM provider.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Internal name, also the key under `providers` in the config file.
    pub name: &'static str,
    /// Keywords to match in model names (lowercase). E.g. `&["claude", "anthropic"]`.
    pub keywords: &'static [&'static str],
    /// Conventional environment variable for the API key, shown in hints.
    pub env_key: &'static str,
    /// Human-readable name for logs.
    pub display_name: &'static str,
    /// Gateways route any `vendor/model` id and are used as fallback.
    pub is_gateway: bool,
    /// Self-hosted endpoint; only used when an `apiBase` is configured.
    pub is_local: bool,
    /// If the API key starts with this prefix, the key belongs to this provider.
    pub detect_by_key_prefix: Option<&'static str>,
    pub default_api_base: &'static str,
}

/// Supported providers, in matching priority order.
pub static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "openrouter",
        keywords: &["openrouter"],
        env_key: "OPENROUTER_API_KEY",
        display_name: "OpenRouter",
        is_gateway: true,
        is_local: false,
        detect_by_key_prefix: Some("sk-or-"),
        default_api_base: "https://openrouter.ai/api/v1",
    },
    ProviderSpec {
        name: "anthropic",
        keywords: &["anthropic", "claude"],
        env_key: "ANTHROPIC_API_KEY",
        display_name: "Anthropic",
        is_gateway: false,
        is_local: false,
        detect_by_key_prefix: Some("sk-ant-"),
        default_api_base: "https://api.anthropic.com/v1",
    },
    ProviderSpec {
        name: "openai",
        keywords: &["openai", "gpt"],
        env_key: "OPENAI_API_KEY",
        display_name: "OpenAI",
        is_gateway: false,
        is_local: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.openai.com/v1",
    },
    ProviderSpec {
        name: "deepseek",
        keywords: &["deepseek"],
        env_key: "DEEPSEEK_API_KEY",
        display_name: "DeepSeek",
        is_gateway: false,
        is_local: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.deepseek.com/v1",
    },
    ProviderSpec {
        name: "groq",
        keywords: &["groq", "llama", "mixtral"],
        env_key: "GROQ_API_KEY",
        display_name: "Groq",
        is_gateway: false,
        is_local: false,
        detect_by_key_prefix: Some("gsk_"),
        default_api_base: "https://api.groq.com/openai/v1",
    },
    ProviderSpec {
        name: "vllm",
        keywords: &["vllm"],
        env_key: "HOSTED_VLLM_API_KEY",
        display_name: "vLLM",
        is_gateway: false,
        is_local: true,
        detect_by_key_prefix: None,
        default_api_base: "http://localhost:8000/v1",
    },
];

// ─────────────────────────────────────────────
// Matching functions
// ─────────────────────────────────────────────

/// Find a provider spec by matching keywords against a model name.
///
/// Gateways and local providers are skipped; they are fallbacks.
pub fn find_by_model(model: &str) -> Option<&'static ProviderSpec> {
    let model_lower = model.to_lowercase();
    PROVIDERS.iter().find(|spec| {
        !spec.is_gateway
            && !spec.is_local
            && spec.keywords.iter().any(|kw| model_lower.contains(kw))
    })
}

/// Find a provider spec by exact name.
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}

/// Guess which provider an API key belongs to from its prefix.
pub fn find_by_key_prefix(api_key: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|s| {
        s.detect_by_key_prefix
            .is_some_and(|pfx| api_key.starts_with(pfx))
    })
}

/// Model id to send on the wire.
///
/// Gateways take `vendor/model` as-is; direct providers drop their own
/// `name/` prefix, so `"deepseek/deepseek-chat"` becomes `"deepseek-chat"`.
pub fn resolve_model_name(model: &str, spec: &ProviderSpec) -> String {
    if spec.is_gateway {
        return model.to_string();
    }
    model
        .strip_prefix(spec.name)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(model)
        .to_string()
}

/// Match a model name to a configured provider.
///
/// 1. Keyword match, only if that provider has an API key.
/// 2. The first configured gateway.
/// 3. A local provider that has an `apiBase` set.
pub fn match_provider<'a>(
    model: &str,
    providers: &'a HashMap<String, ProviderConfig>,
) -> Option<(&'a ProviderConfig, &'static ProviderSpec)> {
    if let Some(spec) = find_by_model(model) {
        if let Some(config) = providers.get(spec.name).filter(|c| c.is_configured()) {
            return Some((config, spec));
        }
    }

    let gateway = PROVIDERS.iter().filter(|s| s.is_gateway).find_map(|spec| {
        providers
            .get(spec.name)
            .filter(|c| c.is_configured())
            .map(|c| (c, spec))
    });
    if gateway.is_some() {
        return gateway;
    }

    PROVIDERS.iter().filter(|s| s.is_local).find_map(|spec| {
        providers
            .get(spec.name)
            .filter(|c| c.api_base.is_some())
            .map(|c| (c, spec))
    })
}

/// `"OPENAI_API_KEY, OPENROUTER_API_KEY"`-style hint for error messages.
pub fn key_hint(model: &str) -> String {
    let mut keys: Vec<&str> = find_by_model(model).map(|s| s.env_key).into_iter().collect();
    keys.extend(PROVIDERS.iter().filter(|s| s.is_gateway).map(|s| s.env_key));
    keys.join(", ")
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(key: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: key.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_find_by_model() {
        assert_eq!(find_by_model("claude-sonnet-4").unwrap().name, "anthropic");
        assert_eq!(find_by_model("gpt-4o-mini").unwrap().name, "openai");
        assert_eq!(find_by_model("deepseek-chat").unwrap().name, "deepseek");
        assert_eq!(find_by_model("llama-3.3-70b-versatile").unwrap().name, "groq");
    }

    #[test]
    fn test_find_by_model_skips_gateway() {
        let spec = find_by_model("openrouter/anthropic/claude-3").unwrap();
        assert_eq!(spec.name, "anthropic");
    }

    #[test]
    fn test_find_by_model_unknown() {
        assert!(find_by_model("some-random-model-xyz").is_none());
    }

    #[test]
    fn test_find_by_key_prefix() {
        assert_eq!(find_by_key_prefix("sk-or-abc").unwrap().name, "openrouter");
        assert_eq!(find_by_key_prefix("gsk_123").unwrap().name, "groq");
        assert!(find_by_key_prefix("sk-regular").is_none());
    }

    #[test]
    fn test_resolve_model_strips_own_prefix() {
        let spec = find_by_name("deepseek").unwrap();
        assert_eq!(resolve_model_name("deepseek/deepseek-chat", spec), "deepseek-chat");
        assert_eq!(resolve_model_name("deepseek-chat", spec), "deepseek-chat");
    }

    #[test]
    fn test_resolve_model_keeps_foreign_prefix() {
        let spec = find_by_name("openai").unwrap();
        assert_eq!(resolve_model_name("openai/gpt-4o", spec), "gpt-4o");
        assert_eq!(resolve_model_name("openaix/gpt", spec), "openaix/gpt");
    }

    #[test]
    fn test_resolve_model_gateway_passthrough() {
        let spec = find_by_name("openrouter").unwrap();
        assert_eq!(
            resolve_model_name("anthropic/claude-3.5-sonnet", spec),
            "anthropic/claude-3.5-sonnet"
        );
    }

    #[test]
    fn test_match_provider_direct() {
        let mut providers = HashMap::new();
        providers.insert("anthropic".to_string(), configured("sk-ant-123"));

        let (config, spec) = match_provider("claude-sonnet-4", &providers).unwrap();
        assert_eq!(spec.name, "anthropic");
        assert_eq!(config.api_key, "sk-ant-123");
    }

    #[test]
    fn test_match_provider_gateway_fallback() {
        let mut providers = HashMap::new();
        providers.insert("openrouter".to_string(), configured("sk-or-fallback"));

        let (_, spec) = match_provider("mistralai/mistral-large", &providers).unwrap();
        assert_eq!(spec.name, "openrouter");
    }

    #[test]
    fn test_match_provider_local_needs_base() {
        let mut providers = HashMap::new();
        providers.insert("vllm".to_string(), ProviderConfig::default());
        assert!(match_provider("my-finetune", &providers).is_none());

        providers.insert(
            "vllm".to_string(),
            ProviderConfig {
                api_base: Some("http://gpu-box:8000/v1".to_string()),
                ..Default::default()
            },
        );
        let (_, spec) = match_provider("my-finetune", &providers).unwrap();
        assert_eq!(spec.name, "vllm");
    }

    #[test]
    fn test_match_provider_no_key() {
        let mut providers = HashMap::new();
        providers.insert("anthropic".to_string(), configured(""));
        assert!(match_provider("claude-3", &providers).is_none());
    }

    #[test]
    fn test_key_hint_mentions_direct_and_gateway() {
        let hint = key_hint("gpt-4o");
        assert!(hint.contains("OPENAI_API_KEY"));
        assert!(hint.contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn test_all_providers_have_unique_names() {
        let mut names: Vec<&str> = PROVIDERS.iter().map(|s| s.name).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total, "Duplicate provider names found");
    }
}
