//! LLM provider trait — the boundary the reasoning loop talks through.
//!
//! A provider takes the ordered conversation plus generation parameters and
//! returns the assistant's text. Every failure mode (network, non-2xx status,
//! unreadable body) surfaces as a [`ProviderError`].

use async_trait::async_trait;
use reagent_core::types::Message;

use crate::error::ProviderError;

/// Generation parameters passed through to the provider uninterpreted.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// Trait that all LLM providers implement.
///
/// The main implementation is `HttpProvider`, which handles any
/// OpenAI-compatible API; tests substitute scripted providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send the conversation and return the assistant's reply text.
    async fn complete(
        &self,
        messages: &[Message],
        model: &str,
        config: &LlmRequestConfig,
    ) -> Result<String, ProviderError>;

    /// The default model for this provider instance.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
