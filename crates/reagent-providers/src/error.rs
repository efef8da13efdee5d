use thiserror::Error;

/// Why an LLM call produced no usable reply.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("could not build HTTP client: {0}")]
    Client(String),

    #[error("request to LLM failed: {0}")]
    Transport(String),

    #[error("LLM API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed LLM response: {0}")]
    Malformed(String),

    #[error("no configured provider for model '{model}' (set one of: {hint})")]
    NotConfigured { model: String, hint: String },
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}
