//! Crawler collaborator — breadth-first crawl of one site.
//!
//! Starts at a URL, follows links on the same host, and returns a short text
//! summary of each page visited. Pages that fail to load are noted and skipped.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use reagent_core::utils::truncate_string;

use super::base::{
    bounded_count, require_string, unknown_operation, Arguments, Collaborator, ParamKind,
    ParamSpec, RetryPolicy, ToolDescriptor,
};
use super::browser::{fetch, parse_http_url};
use super::html::{extract_links, extract_title, strip_html_tags};

/// Hard ceiling regardless of what the model asks for.
const MAX_PAGES_LIMIT: usize = 25;
const SUMMARY_CHARS: usize = 600;

pub struct CrawlerCollaborator {
    client: Client,
    retry: RetryPolicy,
    default_max_pages: usize,
}

impl CrawlerCollaborator {
    pub fn new(client: Client, default_max_pages: usize) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            default_max_pages: default_max_pages.clamp(1, MAX_PAGES_LIMIT),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn crawl(&self, args: &Arguments) -> anyhow::Result<String> {
        let start = parse_http_url(&require_string(args, "url")?)?;
        let max_pages = bounded_count(args, "max_pages", self.default_max_pages, 1, MAX_PAGES_LIMIT);
        let host = start.host_str().map(str::to_string);

        let mut queue: VecDeque<Url> = VecDeque::from([start.clone()]);
        let mut seen: HashSet<String> = HashSet::from([start.to_string()]);
        let mut sections = Vec::new();
        let mut visited = 0;

        while let Some(url) = queue.pop_front() {
            if visited >= max_pages {
                break;
            }
            visited += 1;

            let page = match fetch(&self.client, &self.retry, url.clone()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(url = %url, error = %e, "crawl fetch failed");
                    sections.push(format!("## {url}\n(failed: {e})"));
                    continue;
                }
            };
            if !page.is_html() {
                sections.push(format!("## {url}\n(skipped: {})", page.content_type));
                continue;
            }

            let title = extract_title(&page.body).unwrap_or_else(|| "(untitled)".into());
            let text = truncate_string(&strip_html_tags(&page.body), SUMMARY_CHARS);
            sections.push(format!("## {title}\n{}\n{text}", page.final_url));

            for link in extract_links(&page.body, &page.final_url) {
                if link.url.host_str().map(str::to_string) != host {
                    continue;
                }
                if seen.insert(link.url.to_string()) {
                    queue.push_back(link.url);
                }
            }
        }

        debug!(start = %start, visited, queued = queue.len(), "crawl finished");
        Ok(format!(
            "Crawled {visited} page(s) starting at {start}:\n\n{}",
            sections.join("\n\n")
        ))
    }
}

#[async_trait]
impl Collaborator for CrawlerCollaborator {
    fn name(&self) -> &str {
        "crawler"
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new(
            "crawl-site",
            "crawler",
            "crawl",
            "Crawl pages of one website (same host, breadth-first) and summarize each page",
        )
        .param(ParamSpec::required("url", ParamKind::String, "Start URL"))
        .param(ParamSpec::optional(
            "max_pages",
            ParamKind::Integer,
            "Maximum pages to visit",
        ))]
    }

    async fn invoke(&self, operation: &str, args: &Arguments) -> anyhow::Result<String> {
        match operation {
            "crawl" => self.crawl(args).await,
            other => Err(unknown_operation(self.name(), other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::browser::http_client;
    use reagent_core::config::schema::WebConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn html_page(server: &MockServer, at: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
            .mount(server)
            .await;
    }

    fn crawler() -> CrawlerCollaborator {
        CrawlerCollaborator::new(http_client(&WebConfig::default()), 5)
    }

    #[tokio::test]
    async fn test_crawl_same_host_breadth_first() {
        let server = MockServer::start().await;
        html_page(
            &server,
            "/",
            r#"<title>Home</title><a href="/one">1</a><a href="/two">2</a><a href="https://elsewhere.invalid/x">ext</a>"#.into(),
        )
        .await;
        html_page(&server, "/one", "<title>One</title><p>first page</p>".into()).await;
        html_page(&server, "/two", r#"<title>Two</title><a href="/">home</a>"#.into()).await;

        let args = json!({"url": format!("{}/", server.uri())});
        let out = crawler()
            .invoke("crawl", args.as_object().unwrap())
            .await
            .unwrap();

        assert!(out.starts_with("Crawled 3 page(s)"));
        let home = out.find("## Home").unwrap();
        let one = out.find("## One").unwrap();
        let two = out.find("## Two").unwrap();
        assert!(home < one && one < two);
        assert!(out.contains("first page"));
        assert!(!out.contains("elsewhere"));
    }

    #[tokio::test]
    async fn test_crawl_respects_max_pages_and_reports_failures() {
        let server = MockServer::start().await;
        html_page(
            &server,
            "/",
            r#"<title>Home</title><a href="/missing">gone</a><a href="/ok">ok</a>"#.into(),
        )
        .await;
        html_page(&server, "/ok", "<title>Ok</title>".into()).await;

        let args = json!({"url": server.uri(), "max_pages": 2});
        let out = crawler()
            .invoke("crawl", args.as_object().unwrap())
            .await
            .unwrap();
        assert!(out.starts_with("Crawled 2 page(s)"));
        assert!(out.contains("failed"));
        assert!(!out.contains("## Ok"));
    }
}
