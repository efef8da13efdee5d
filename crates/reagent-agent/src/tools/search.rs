//! Search collaborator — web search via the Brave Search API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::base::{
    bounded_count, require_string, send_with_retry, unknown_operation, Arguments, Collaborator,
    ParamKind, ParamSpec, RetryPolicy, ToolDescriptor,
};

const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

pub struct SearchCollaborator {
    client: Client,
    retry: RetryPolicy,
    api_key: Option<String>,
    endpoint: String,
    max_results: usize,
}

impl SearchCollaborator {
    /// `api_key` may be empty; it then falls back to the `BRAVE_API_KEY` env var.
    pub fn new(client: Client, api_key: &str, max_results: usize) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            api_key: Some(api_key.to_string()).filter(|k| !k.is_empty()),
            endpoint: BRAVE_ENDPOINT.to_string(),
            max_results: max_results.clamp(1, 10),
        }
    }

    /// Point at a different search endpoint (same response shape).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("BRAVE_API_KEY").ok().filter(|k| !k.is_empty()))
    }

    async fn search(&self, args: &Arguments) -> anyhow::Result<String> {
        let query = require_string(args, "query")?;
        let count = bounded_count(args, "count", self.max_results, 1, 10);

        let api_key = self.resolve_api_key().ok_or_else(|| {
            anyhow::anyhow!("No Brave API key configured (set tools.search.apiKey or BRAVE_API_KEY)")
        })?;

        debug!(query = %query, count, "searching web");

        let request = self
            .client
            .get(&self.endpoint)
            .header("X-Subscription-Token", &api_key)
            .header("Accept", "application/json")
            .query(&[("q", query.as_str()), ("count", &count.to_string())]);
        let resp = send_with_retry(&self.retry, request)
            .await
            .map_err(|e| anyhow::anyhow!("Brave API request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Brave API returned {status}: {body}");
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse Brave response: {e}"))?;

        let results = body["web"]["results"].as_array().cloned().unwrap_or_default();
        if results.is_empty() {
            return Ok(format!("No results found for '{query}'."));
        }

        let output: Vec<String> = results
            .iter()
            .take(count)
            .enumerate()
            .map(|(i, r)| {
                let title = r["title"].as_str().unwrap_or("(no title)");
                let url = r["url"].as_str().unwrap_or("");
                let desc = r["description"].as_str().unwrap_or("");
                format!("{}. {}\n   {}\n   {}", i + 1, title, url, desc)
            })
            .collect();
        Ok(output.join("\n\n"))
    }
}

#[async_trait]
impl Collaborator for SearchCollaborator {
    fn name(&self) -> &str {
        "search"
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new(
            "web-search",
            "search",
            "search",
            "Search the web. Returns a numbered list of results with titles, URLs, and descriptions",
        )
        .param(ParamSpec::required("query", ParamKind::String, "The search query"))
        .param(ParamSpec::optional(
            "count",
            ParamKind::Integer,
            "Number of results (1-10)",
        ))]
    }

    async fn invoke(&self, operation: &str, args: &Arguments) -> anyhow::Result<String> {
        match operation {
            "search" => self.search(args).await,
            other => Err(unknown_operation(self.name(), other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_search_formats_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(header("X-Subscription-Token", "brave-key"))
            .and(query_param("q", "rust async"))
            .and(query_param("count", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "web": {"results": [
                    {"title": "Tokio", "url": "https://tokio.rs", "description": "Async runtime"},
                    {"title": "async-std", "url": "https://async.rs", "description": "Another one"}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let search = SearchCollaborator::new(Client::new(), "brave-key", 5)
            .with_endpoint(format!("{}/search", server.uri()));
        let out = search
            .invoke("search", &args(json!({"query": "rust async", "count": 2})))
            .await
            .unwrap();
        assert!(out.starts_with("1. Tokio\n   https://tokio.rs\n   Async runtime"));
        assert!(out.contains("2. async-std"));
    }

    #[tokio::test]
    async fn test_search_no_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"web": {"results": []}})))
            .mount(&server)
            .await;

        let search = SearchCollaborator::new(Client::new(), "k", 5).with_endpoint(server.uri());
        let out = search.invoke("search", &args(json!({"query": "zzz"}))).await.unwrap();
        assert_eq!(out, "No results found for 'zzz'.");
    }

    #[tokio::test]
    async fn test_search_retries_503_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "web": {"results": [{"title": "Back", "url": "https://up.example", "description": ""}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let search = SearchCollaborator::new(Client::new(), "k", 5)
            .with_endpoint(server.uri())
            .with_retry(RetryPolicy {
                max_retries: 3,
                base_delay: std::time::Duration::from_millis(1),
                max_delay: std::time::Duration::from_millis(10),
            });
        let out = search.invoke("search", &args(json!({"query": "x"}))).await.unwrap();
        assert!(out.starts_with("1. Back"));
    }

    #[tokio::test]
    async fn test_search_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let search = SearchCollaborator::new(Client::new(), "k", 5).with_endpoint(server.uri());
        let err = search
            .invoke("search", &args(json!({"query": "x"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
