//! Collaborator trait and tool descriptors.
//!
//! A collaborator is one external capability provider (clock, browser, news
//! feed…). It advertises a set of [`ToolDescriptor`]s and executes them by
//! operation name. The registry maps tool ids onto those descriptors; the
//! dispatcher validates arguments against each descriptor's params before the
//! collaborator ever sees them.

use async_trait::async_trait;
use rand::Rng;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Tool-call arguments, keyed by parameter name.
pub type Arguments = serde_json::Map<String, Value>;

// ─────────────────────────────────────────────
// Descriptors
// ─────────────────────────────────────────────

/// Declared type of a tool parameter. Drives argument coercion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            description: description.to_string(),
        }
    }

    pub fn optional(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// Binds a tool id to one operation of one collaborator.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub tool_id: String,
    pub collaborator: String,
    pub operation: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    pub fn new(tool_id: &str, collaborator: &str, operation: &str, description: &str) -> Self {
        Self {
            tool_id: tool_id.to_string(),
            collaborator: collaborator.to_string(),
            operation: operation.to_string(),
            description: description.to_string(),
            params: Vec::new(),
        }
    }

    /// Builder-style parameter declaration.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Names of the parameters that must be present.
    pub fn required_args(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
    }

    /// `collaborator.operation`, the form `TOOL_CALL:` and `use_mcp_tool` blocks name tools by.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.collaborator, self.operation)
    }

    /// One catalogue line, e.g. `get-news(topic?: string, max_articles?: integer)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let opt = if p.required { "" } else { "?" };
                format!("{}{}: {}", p.name, opt, p.kind)
            })
            .collect();
        format!("{}({})", self.tool_id, params.join(", "))
    }
}

// ─────────────────────────────────────────────
// Collaborator trait
// ─────────────────────────────────────────────

/// An external capability provider invoked by tool id.
///
/// `invoke` receives arguments that already passed presence and type checks
/// against the operation's descriptor. Errors are reported back to the model
/// as data, so messages should be short and actionable.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Unique collaborator name (e.g. `"clock"`).
    fn name(&self) -> &str;

    /// The tools this collaborator offers.
    fn tools(&self) -> Vec<ToolDescriptor>;

    /// Run one operation.
    async fn invoke(&self, operation: &str, args: &Arguments) -> anyhow::Result<String>;
}

// ─────────────────────────────────────────────
// Argument helpers
// ─────────────────────────────────────────────

/// Extract a required `String` argument.
pub fn require_string(args: &Arguments, key: &str) -> anyhow::Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Missing required argument: {key}"))
}

/// Extract an optional `String` argument.
pub fn optional_string(args: &Arguments, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Extract an optional integer argument.
pub fn optional_i64(args: &Arguments, key: &str) -> Option<i64> {
    args.get(key).and_then(|v| v.as_i64())
}

/// Optional count argument clamped into `[min, max]`.
pub fn bounded_count(args: &Arguments, key: &str, default: usize, min: usize, max: usize) -> usize {
    optional_i64(args, key)
        .map(|n| n.max(0) as usize)
        .unwrap_or(default)
        .clamp(min, max)
}

/// The error a collaborator returns for an operation it doesn't have.
pub fn unknown_operation(collaborator: &str, operation: &str) -> anyhow::Error {
    anyhow::anyhow!("{collaborator} has no operation '{operation}'")
}

// ─────────────────────────────────────────────
// Retry
// ─────────────────────────────────────────────

/// Exponential backoff for the network collaborators.
///
/// Connection failures, timeouts, `429` and `5xx` responses are retried;
/// every other response goes straight back to the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Sleep before retry `attempt` (0-based): `base * 2^attempt` plus up to
    /// 25% jitter, never above `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0.0..=0.25);
        backoff.mul_f64(1.0 + jitter).min(self.max_delay)
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Send `request`, retrying transient failures per `policy`.
///
/// Once retries run out the last response (or error) is returned as is.
/// Requests with a streaming body can't be cloned and are sent once.
pub async fn send_with_retry(
    policy: &RetryPolicy,
    request: RequestBuilder,
) -> reqwest::Result<Response> {
    let mut attempt = 0;
    loop {
        let Some(current) = request.try_clone() else {
            return request.send().await;
        };
        let reason = match current.send().await {
            Ok(resp) if attempt < policy.max_retries && is_transient(resp.status()) => {
                resp.status().to_string()
            }
            Err(e) if attempt < policy.max_retries && (e.is_connect() || e.is_timeout()) => {
                e.to_string()
            }
            other => return other,
        };

        let delay = policy.delay(attempt);
        attempt += 1;
        warn!(
            attempt,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            reason = %reason,
            "retrying request"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_require_string() {
        let a = args(json!({"url": "https://example.com", "n": 3}));
        assert_eq!(require_string(&a, "url").unwrap(), "https://example.com");
        assert!(require_string(&a, "n").is_err());
        assert!(require_string(&a, "missing").is_err());
    }

    #[test]
    fn test_optional_helpers() {
        let a = args(json!({"topic": "tech", "count": 5}));
        assert_eq!(optional_string(&a, "topic"), Some("tech".into()));
        assert_eq!(optional_string(&a, "other"), None);
        assert_eq!(optional_i64(&a, "count"), Some(5));
        assert_eq!(optional_i64(&a, "topic"), None);
    }

    #[test]
    fn test_bounded_count() {
        let a = args(json!({"big": 500, "neg": -3}));
        assert_eq!(bounded_count(&a, "big", 5, 1, 10), 10);
        assert_eq!(bounded_count(&a, "neg", 5, 1, 10), 1);
        assert_eq!(bounded_count(&a, "absent", 5, 1, 10), 5);
    }

    #[test]
    fn test_descriptor_required_args_and_signature() {
        let desc = ToolDescriptor::new("browse-url", "browser", "fetch_page", "Fetch a page")
            .param(ParamSpec::required("url", ParamKind::String, "Page URL"))
            .param(ParamSpec::optional("max_chars", ParamKind::Integer, "Cap"));

        assert_eq!(desc.required_args().collect::<Vec<_>>(), vec!["url"]);
        assert_eq!(desc.qualified_name(), "browser.fetch_page");
        assert_eq!(desc.signature(), "browse-url(url: string, max_chars?: integer)");
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        let first = policy.delay(0);
        assert!(first >= Duration::from_millis(500) && first <= Duration::from_millis(625));
        let third = policy.delay(2);
        assert!(third >= Duration::from_secs(2) && third <= Duration::from_millis(2500));
        assert_eq!(policy.delay(10), Duration::from_secs(5));
        assert_eq!(policy.delay(40), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_send_with_retry_recovers_after_503() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let resp = send_with_retry(&quick_retry(), client.get(format!("{}/flaky", server.uri())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_send_with_retry_gives_up_with_last_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let resp = send_with_retry(&quick_retry(), client.get(server.uri()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_send_with_retry_leaves_client_errors_alone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let resp = send_with_retry(&quick_retry(), client.get(server.uri()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
