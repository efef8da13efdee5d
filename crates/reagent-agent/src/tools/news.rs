//! News collaborator — headlines from RSS feeds grouped by topic.
//!
//! The topic picks a feed group: the first configured key contained in the
//! topic wins, otherwise `general`. Feeds in a group are tried in order and
//! the first one that yields articles is used.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use reagent_core::config::schema::NewsConfig;
use reagent_core::utils::truncate_string;

use super::base::{
    bounded_count, optional_string, send_with_retry, unknown_operation, Arguments, Collaborator,
    ParamKind, ParamSpec, RetryPolicy, ToolDescriptor,
};
use super::html::{decode_entities, strip_html_tags};

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<item\b[^>]*>(.*?)</item>").unwrap());
static CDATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").unwrap());

/// Items read from each feed.
const ITEMS_PER_FEED: usize = 10;
const SUMMARY_CHARS: usize = 200;
const FALLBACK_GROUP: &str = "general";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Article {
    pub headline: String,
    pub url: String,
    pub summary: String,
    pub published: String,
}

#[derive(Debug, Serialize)]
struct NewsReport<'a> {
    topic: &'a str,
    feed_group: &'a str,
    feed_url: Option<&'a str>,
    sources_tried: usize,
    articles: Vec<Article>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

/// Parse RSS 2.0 `<item>` elements.
pub fn parse_rss(xml: &str) -> Vec<Article> {
    ITEM_RE
        .captures_iter(xml)
        .take(ITEMS_PER_FEED)
        .filter_map(|caps| caps.get(1))
        .map(|item| {
            let item = item.as_str();
            Article {
                headline: element_text(item, "title"),
                url: element_text(item, "link"),
                summary: truncate_string(
                    &strip_html_tags(&element_text(item, "description")),
                    SUMMARY_CHARS,
                ),
                published: element_text(item, "pubDate"),
            }
        })
        .collect()
}

fn element_text(item: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let Some(start) = item.find(&open) else {
        return String::new();
    };
    let Some(gt) = item[start..].find('>') else {
        return String::new();
    };
    let body_start = start + gt + 1;
    // `<title/>` is an empty element
    if item[..body_start].ends_with("/>") {
        return String::new();
    }
    let Some(len) = item[body_start..].find(&close) else {
        return String::new();
    };
    let raw = &item[body_start..body_start + len];
    let unwrapped = CDATA_RE.replace_all(raw, "$1");
    decode_entities(unwrapped.trim())
}

pub struct NewsCollaborator {
    client: Client,
    retry: RetryPolicy,
    feeds: HashMap<String, Vec<String>>,
    max_articles: usize,
}

impl NewsCollaborator {
    pub fn new(client: Client, config: &NewsConfig) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            feeds: config.feeds.clone(),
            max_articles: config.max_articles.clamp(1, ITEMS_PER_FEED),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Feed group for a topic: longest configured key contained in it, else `general`.
    fn feed_group(&self, topic: &str) -> &str {
        let normalized = topic.to_lowercase();
        let mut keys: Vec<&String> = self.feeds.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        keys.into_iter()
            .find(|k| !k.is_empty() && normalized.contains(k.to_lowercase().as_str()))
            .map(String::as_str)
            .unwrap_or(FALLBACK_GROUP)
    }

    async fn fetch_feed(&self, url: &str) -> anyhow::Result<Vec<Article>> {
        let resp = send_with_retry(&self.retry, self.client.get(url))
            .await
            .map_err(|e| anyhow::anyhow!("request failed: {e}"))?;
        if !resp.status().is_success() {
            anyhow::bail!("returned {}", resp.status());
        }
        let body = resp.text().await?;
        Ok(parse_rss(&body))
    }

    async fn get_news(&self, args: &Arguments) -> anyhow::Result<String> {
        let topic = optional_string(args, "topic")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| FALLBACK_GROUP.to_string());
        let max_articles = bounded_count(args, "max_articles", self.max_articles, 1, ITEMS_PER_FEED);

        let group = self.feed_group(&topic);
        let urls = self
            .feeds
            .get(group)
            .filter(|urls| !urls.is_empty())
            .ok_or_else(|| anyhow::anyhow!("No news feeds configured for '{group}'"))?;

        debug!(topic = %topic, group, feeds = urls.len(), "fetching news");

        let mut errors = Vec::new();
        let mut found = None;
        let mut attempted = 0;
        for url in urls {
            attempted += 1;
            match self.fetch_feed(url).await {
                Ok(articles) if !articles.is_empty() => {
                    found = Some((url.as_str(), articles));
                    break;
                }
                Ok(_) => errors.push(format!("{url}: no articles")),
                Err(e) => {
                    warn!(feed = %url, error = %e, "news feed failed");
                    errors.push(format!("{url}: {e}"));
                }
            }
        }

        let Some((feed_url, mut articles)) = found else {
            anyhow::bail!("All news feeds failed for '{topic}': {}", errors.join("; "));
        };
        articles.truncate(max_articles);

        let report = NewsReport {
            topic: &topic,
            feed_group: group,
            feed_url: Some(feed_url),
            sources_tried: attempted,
            articles,
            errors,
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

#[async_trait]
impl Collaborator for NewsCollaborator {
    fn name(&self) -> &str {
        "news"
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        let mut groups: Vec<&str> = self.feeds.keys().map(String::as_str).collect();
        groups.sort_unstable();
        vec![ToolDescriptor::new(
            "get-news",
            "news",
            "get_news",
            "Latest news headlines from RSS feeds",
        )
        .param(ParamSpec::optional(
            "topic",
            ParamKind::String,
            &format!("News topic (feed groups: {})", groups.join(", ")),
        ))
        .param(ParamSpec::optional(
            "max_articles",
            ParamKind::Integer,
            "Maximum articles to return",
        ))]
    }

    async fn invoke(&self, operation: &str, args: &Arguments) -> anyhow::Result<String> {
        match operation {
            "get_news" => self.get_news(args).await,
            other => Err(unknown_operation(self.name(), other)),
        }
    }
}
