//! Artifact extraction — pulls a renderable HTML page out of a final answer.

use std::sync::LazyLock;

use regex::Regex;

static HTML_MIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:application/vnd\.ant\.html|text/html)[ \t]*\r?\n").unwrap());
static HTML_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!DOCTYPE html>|<html").unwrap());
static HTML_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</html>").unwrap());
static MARKDOWN_MIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"text/markdown[ \t]*\r?\n").unwrap());

const HTML_FENCE: &str = "```html";

/// Turns a final answer into an optional side artifact.
pub trait ArtifactExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Option<String>;
}

/// Recognises HTML documents, ```` ```html ```` fences and markdown documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlArtifactExtractor;

impl ArtifactExtractor for HtmlArtifactExtractor {
    fn extract(&self, text: &str) -> Option<String> {
        html_document(text)
            .or_else(|| html_fence(text))
            .or_else(|| markdown_document(text))
    }
}

/// `text/html` marker line, then `<!DOCTYPE html>`/`<html` through `</html>`.
fn html_document(text: &str) -> Option<String> {
    let marker = HTML_MIME_RE.find(text)?;
    let rest = &text[marker.end()..];
    let start = HTML_START_RE.find(rest)?.start();
    let end = HTML_END_RE.find(&rest[start..])?.end();
    Some(rest[start..start + end].trim().to_string())
}

/// Everything between ```` ```html ```` and the next fence, or the end of text.
fn html_fence(text: &str) -> Option<String> {
    let open = text.find(HTML_FENCE)? + HTML_FENCE.len();
    let body = &text[open..];
    let close = body.find("```").unwrap_or(body.len());
    let html = body[..close].trim();
    (!html.is_empty()).then(|| html.to_string())
}

fn markdown_document(text: &str) -> Option<String> {
    let marker = MARKDOWN_MIME_RE.find(text)?;
    let content = text[marker.end()..].trim();
    if content.is_empty() {
        return None;
    }
    Some(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>body {{ font-family: sans-serif; padding: 20px; line-height: 1.6; }}</style>
</head>
<body>
<pre style="white-space: pre-wrap; font-family: inherit;">{}</pre>
</body>
</html>"#,
        escape_html(content)
    ))
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
