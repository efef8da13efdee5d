//! HTML helpers shared by the browser, crawler and news collaborators.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"'#][^"']*)["'][^>]*>(.*?)</a>"#).unwrap()
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

/// Remove HTML tags, scripts, and styles, then collapse whitespace.
///
/// Simple regex-free approach suitable for LLM consumption.
pub fn strip_html_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;
    let mut tag_name = String::new();
    let mut collecting_tag_name = false;

    for ch in html.chars() {
        if ch == '<' {
            in_tag = true;
            collecting_tag_name = true;
            tag_name.clear();
            continue;
        }
        if ch == '>' && in_tag {
            in_tag = false;
            collecting_tag_name = false;
            match tag_name.to_lowercase().as_str() {
                "script" => in_script = true,
                "/script" => in_script = false,
                "style" => in_style = true,
                "/style" => in_style = false,
                "br" | "br/" | "p" | "/p" | "div" | "/div" | "li" | "/li" | "tr" | "/tr"
                | "h1" | "h2" | "h3" | "h4" | "/h1" | "/h2" | "/h3" | "/h4" => result.push('\n'),
                _ => {}
            }
            continue;
        }
        if in_tag {
            if collecting_tag_name && (ch.is_alphanumeric() || ch == '/') {
                tag_name.push(ch);
            } else {
                collecting_tag_name = false;
            }
            continue;
        }
        if in_script || in_style {
            continue;
        }
        result.push(ch);
    }

    collapse_whitespace(&decode_entities(&result))
}

/// Decode the handful of entities that show up in page text and feeds.
pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Runs of spaces become one space, runs of newlines one newline.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_space = false;
    let mut prev_newline = false;
    for c in text.chars() {
        if c == '\n' {
            if !prev_newline {
                // drop a trailing space before the break
                if out.ends_with(' ') {
                    out.pop();
                }
                out.push('\n');
            }
            prev_newline = true;
            prev_space = false;
        } else if c.is_whitespace() {
            if !prev_space && !prev_newline {
                out.push(' ');
            }
            prev_space = true;
        } else {
            prev_space = false;
            prev_newline = false;
            out.push(c);
        }
    }
    out.trim().to_string()
}

/// Contents of `<title>`, tags stripped.
pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    let title = strip_html_tags(raw);
    (!title.is_empty()).then_some(title)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub url: Url,
    pub text: String,
}

/// Absolute http(s) links in document order, fragments dropped, duplicates removed.
pub fn extract_links(html: &str, base: &Url) -> Vec<Link> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for caps in LINK_RE.captures_iter(html) {
        let Some(href) = caps.get(1) else { continue };
        let Ok(mut url) = base.join(decode_entities(href.as_str().trim()).as_str()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        url.set_fragment(None);
        if !seen.insert(url.to_string()) {
            continue;
        }
        let text = caps.get(2).map(|m| strip_html_tags(m.as_str())).unwrap_or_default();
        links.push(Link { url, text });
    }
    links
}
