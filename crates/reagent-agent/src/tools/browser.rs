//! Browser collaborator — fetches a page and extracts its text or links.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use tracing::debug;

use reagent_core::config::schema::WebConfig;
use reagent_core::utils::truncate_string;

use super::base::{
    bounded_count, optional_i64, require_string, send_with_retry, unknown_operation, Arguments,
    Collaborator, ParamKind, ParamSpec, RetryPolicy, ToolDescriptor,
};
use super::html::{extract_links, extract_title, strip_html_tags};

const DEFAULT_LINK_LIMIT: usize = 20;

/// Shared HTTP client for the network collaborators.
pub fn http_client(web: &WebConfig) -> Client {
    Client::builder()
        .user_agent(web.user_agent.as_str())
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(web.timeout_secs.max(1)))
        .build()
        .unwrap_or_default()
}

/// A fetched document.
pub struct Page {
    pub url: Url,
    pub final_url: Url,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl Page {
    pub fn is_html(&self) -> bool {
        self.content_type.contains("html")
            || (self.content_type.is_empty() && self.body.trim_start().starts_with('<'))
    }
}

pub fn parse_http_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| anyhow::anyhow!("Invalid URL '{raw}': {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("Invalid URL: must start with http:// or https://");
    }
    Ok(url)
}

/// GET a page, retrying transient failures. Non-2xx statuses are errors.
pub async fn fetch(client: &Client, retry: &RetryPolicy, url: Url) -> anyhow::Result<Page> {
    debug!(url = %url, "fetching page");
    let resp = send_with_retry(retry, client.get(url.clone()))
        .await
        .map_err(|e| anyhow::anyhow!("HTTP request failed: {e}"))?;

    let status = resp.status();
    let final_url = resp.url().clone();
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let body = resp
        .text()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read response body: {e}"))?;

    if !status.is_success() {
        anyhow::bail!("{url} returned {status}");
    }
    Ok(Page {
        url,
        final_url,
        status: status.as_u16(),
        content_type,
        body,
    })
}

// ─────────────────────────────────────────────
// BrowserCollaborator
// ─────────────────────────────────────────────

pub struct BrowserCollaborator {
    client: Client,
    retry: RetryPolicy,
    max_chars: usize,
}

impl BrowserCollaborator {
    pub fn new(client: Client, max_chars: usize) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            max_chars: max_chars.max(100),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_page(&self, args: &Arguments) -> anyhow::Result<String> {
        let url = parse_http_url(&require_string(args, "url")?)?;
        let max_chars = optional_i64(args, "max_chars")
            .map(|n| n.max(100) as usize)
            .unwrap_or(self.max_chars);

        let page = fetch(&self.client, &self.retry, url).await?;

        // Choose extraction method
        let (text, extractor) = if page.content_type.contains("json") {
            match serde_json::from_str::<Value>(&page.body) {
                Ok(v) => (serde_json::to_string_pretty(&v)?, "json"),
                Err(_) => (page.body.clone(), "raw"),
            }
        } else if page.is_html() {
            (strip_html_tags(&page.body), "text")
        } else {
            (page.body.clone(), "raw")
        };

        let truncated = text.chars().count() > max_chars;
        let text = truncate_string(&text, max_chars);

        let result = json!({
            "url": page.url.as_str(),
            "finalUrl": page.final_url.as_str(),
            "status": page.status,
            "title": extract_title(&page.body),
            "extractor": extractor,
            "truncated": truncated,
            "length": text.chars().count(),
            "text": text,
        });
        Ok(serde_json::to_string_pretty(&result)?)
    }

    async fn extract_links(&self, args: &Arguments) -> anyhow::Result<String> {
        let url = parse_http_url(&require_string(args, "url")?)?;
        let limit = bounded_count(args, "limit", DEFAULT_LINK_LIMIT, 1, 200);

        let page = fetch(&self.client, &self.retry, url).await?;
        let links = extract_links(&page.body, &page.final_url);
        if links.is_empty() {
            return Ok(format!("No links found on {}.", page.final_url));
        }

        let lines: Vec<String> = links
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, l)| {
                let text = if l.text.is_empty() { "(no text)" } else { &l.text };
                format!("{}. {} - {}", i + 1, text, l.url)
            })
            .collect();
        Ok(format!(
            "{} links on {} (showing {}):\n{}",
            links.len(),
            page.final_url,
            lines.len(),
            lines.join("\n")
        ))
    }
}

#[async_trait]
impl Collaborator for BrowserCollaborator {
    fn name(&self) -> &str {
        "browser"
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "browse-url",
                "browser",
                "fetch_page",
                "Fetch a web page and return its readable text as JSON (url, title, text)",
            )
            .param(ParamSpec::required("url", ParamKind::String, "http(s) URL to fetch"))
            .param(ParamSpec::optional(
                "max_chars",
                ParamKind::Integer,
                "Maximum characters of text to return",
            )),
            ToolDescriptor::new(
                "extract-links",
                "browser",
                "extract_links",
                "List the links on a web page",
            )
            .param(ParamSpec::required("url", ParamKind::String, "http(s) URL to fetch"))
            .param(ParamSpec::optional("limit", ParamKind::Integer, "Maximum links (default 20)")),
        ]
    }

    async fn invoke(&self, operation: &str, args: &Arguments) -> anyhow::Result<String> {
        match operation {
            "fetch_page" => self.fetch_page(args).await,
            "extract_links" => self.extract_links(args).await,
            other => Err(unknown_operation(self.name(), other)),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn browser() -> BrowserCollaborator {
        BrowserCollaborator::new(http_client(&WebConfig::default()), 20_000)
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_fetch_page_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<html><head><title>Hello</title></head><body><p>Some <b>text</b></p></body></html>",
                "text/html; charset=utf-8",
            ))
            .mount(&server)
            .await;

        let out = browser()
            .invoke("fetch_page", &args(json!({"url": format!("{}/page", server.uri())})))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["status"], 200);
        assert_eq!(v["title"], "Hello");
        assert_eq!(v["extractor"], "text");
        assert!(v["text"].as_str().unwrap().contains("Some text"));
        assert_eq!(v["truncated"], false);
    }

    #[tokio::test]
    async fn test_fetch_page_truncates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("x".repeat(500), "text/plain"))
            .mount(&server)
            .await;

        let out = browser()
            .invoke("fetch_page", &args(json!({"url": server.uri(), "max_chars": 150})))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["extractor"], "raw");
        assert_eq!(v["truncated"], true);
        assert_eq!(v["length"], 150);
    }

    #[tokio::test]
    async fn test_fetch_page_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = browser()
            .invoke("fetch_page", &args(json!({"url": server.uri()})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_page_retries_unavailable_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>finally</p>", "text/html"))
            .expect(1)
            .mount(&server)
            .await;

        let out = browser()
            .with_retry(RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
            })
            .invoke("fetch_page", &args(json!({"url": format!("{}/busy", server.uri())})))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["status"], 200);
        assert!(v["text"].as_str().unwrap().contains("finally"));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = browser()
            .invoke("fetch_page", &args(json!({"url": "ftp://example.com"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[tokio::test]
    async fn test_extract_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<a href="/a">First</a><a href="/b">Second</a><a href="/c">Third</a>"#,
                "text/html",
            ))
            .mount(&server)
            .await;

        let out = browser()
            .invoke("extract_links", &args(json!({"url": format!("{}/", server.uri()), "limit": 2})))
            .await
            .unwrap();
        assert!(out.starts_with("3 links"));
        assert!(out.contains("1. First - "));
        assert!(out.contains("2. Second - "));
        assert!(!out.contains("Third"));
    }
}
