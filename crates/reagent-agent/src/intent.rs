//! Keyword intent detection for prefetching obvious tool results.
//!
//! "What time is it?" and "show me news about X" are answered far better with
//! fresh data in the conversation from the start, so the loop can run the
//! matching tool before the first model call. Matching is plain substring
//! search over the ASCII-lowercased input.

use serde_json::Value;

use crate::parser::ToolInvocation;
use crate::tools::base::Arguments;

const TIME_PHRASES: &[&str] = &[
    "what time",
    "what's the time",
    "current time",
    "time is it",
    "tell me the time",
];

const NEWS_PHRASES: &[&str] = &[
    "latest news",
    "current news",
    "show me news",
    "tell me about current",
    "what's happening",
    "latest updates",
    "current situation",
    "breaking news",
    "what's new with",
    "recent developments on",
];

/// Checked in order; longer phrases come before their suffixes.
const TOPIC_MARKERS: &[&str] = &[
    "show me the latest news about",
    "show me news about",
    "current news about",
    "recent developments on",
    "what's happening with",
    "what's new with",
    "latest updates on",
    "tell me about",
    "news about",
    "about",
    "on",
];

pub const DEFAULT_TOPIC: &str = "general";

/// The tool call a question obviously needs, if any.
pub fn detect(input: &str) -> Option<ToolInvocation> {
    if is_time_question(input) {
        return Some(ToolInvocation::bare("get-time"));
    }
    if is_news_question(input) {
        let mut args = Arguments::new();
        args.insert("topic".into(), Value::String(extract_news_topic(input)));
        return Some(ToolInvocation::new("get-news", args));
    }
    None
}

pub fn is_time_question(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    TIME_PHRASES.iter().any(|p| lower.contains(p))
}

pub fn is_news_question(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    NEWS_PHRASES.iter().any(|p| lower.contains(p))
        || ((lower.contains("news") || lower.contains("latest")) && lower.contains("about"))
}

/// Text after the first topic marker, with the user's casing kept.
/// Falls back to `"general"`.
pub fn extract_news_topic(input: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `input`.
    let lower = input.to_ascii_lowercase();
    for marker in TOPIC_MARKERS {
        if let Some(end) = find_phrase(&lower, marker) {
            let topic = clean_topic(&input[end..]);
            if !topic.is_empty() {
                return topic;
            }
        }
    }
    DEFAULT_TOPIC.to_string()
}

/// Byte offset just past the first whole-word occurrence of `phrase`.
fn find_phrase(haystack: &str, phrase: &str) -> Option<usize> {
    haystack.match_indices(phrase).find_map(|(start, _)| {
        let end = start + phrase.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        (before_ok && after_ok).then_some(end)
    })
}

fn clean_topic(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?'))
        .trim()
        .to_string()
}
