//! Tool-call parser — pulls tool requests out of free-form assistant text.
//!
//! Models are inconsistent about how they ask for tools, so several textual
//! conventions are accepted side by side:
//!
//! ```text
//! <tool>get-time</tool><args>{}</args>
//!
//! Action: browse-url
//! Args: {"url": "https://example.com"}
//!
//! Action: get-news
//! Args:
//!   topic: rust
//!
//! USE TOOL: get-news
//! topic: rust
//!
//! TOOL_CALL: {"server": "browser", "tool": "fetch_page", "args": {"url": "…"}}
//!
//! <invoke name="use_mcp_tool">
//!   <parameter name="server_name">news</parameter>
//!   <parameter name="tool_name">get_news</parameter>
//!   <parameter name="arguments">{"topic": "rust"}</parameter>
//! </invoke>
//! ```
//!
//! Every occurrence is one call, returned in textual order. A block whose
//! arguments can't be read becomes [`ParsedCall::Malformed`] instead of
//! aborting the scan. The parser never looks at the registry: whether the id
//! exists or the arguments fit is the dispatcher's business.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::tools::base::Arguments;

static TAGGED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool>(.*?)</tool>").unwrap());
static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(Action|USE TOOL):[ \t]*([^\r\n]*)").unwrap());
static ARGS_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*(?:Args|Action Input|Arguments):").unwrap());
static KV_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*(?:-[ \t]+)?([A-Za-z_][\w-]*)[ \t]*:[ \t]*(.*?)[ \t]*$").unwrap()
});
static TOOL_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:TOOL_CALL|tool_call|Tool Call):[ \t]*").unwrap());
static MCP_INVOKE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<invoke\s+name="use_mcp_tool"\s*>(.*?)</invoke>"#).unwrap()
});
static MCP_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<parameter\s+name="([^"]+)"\s*>(.*?)</parameter>"#).unwrap()
});

const ARGS_OPEN: &str = "<args>";
const ARGS_CLOSE: &str = "</args>";

/// Line labels that end an indented `key: value` argument list.
const SECTION_KEYWORDS: &[&str] = &["action", "thought", "observation", "answer", "args"];

// ─────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────

/// A well-formed request to run one tool.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolInvocation {
    pub tool_id: String,
    pub arguments: Arguments,
}

impl ToolInvocation {
    pub fn new(tool_id: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            tool_id: tool_id.into(),
            arguments,
        }
    }

    /// An invocation with no arguments.
    pub fn bare(tool_id: impl Into<String>) -> Self {
        Self::new(tool_id, Arguments::new())
    }

    /// Canonical serialization; parsing it yields this invocation again.
    pub fn to_tagged_block(&self) -> String {
        format!(
            "<tool>{}</tool><args>{}</args>",
            self.tool_id,
            Value::Object(self.arguments.clone())
        )
    }
}

/// Which textual convention a block was written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    Tagged,
    Action,
    ToolCall,
    McpInvoke,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encoding::Tagged => "<tool>",
            Encoding::Action => "Action:",
            Encoding::ToolCall => "TOOL_CALL:",
            Encoding::McpInvoke => "use_mcp_tool",
        })
    }
}

/// A block that looked like a tool call but couldn't be read.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    pub encoding: Encoding,
    /// The tool id, when it was readable.
    pub tool_id: Option<String>,
    pub reason: String,
}

impl ParseError {
    fn new(encoding: Encoding, tool_id: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            encoding,
            tool_id: tool_id.filter(|id| !id.is_empty()).map(str::to_string),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tool_id {
            Some(id) => write!(f, "malformed {} block for '{}': {}", self.encoding, id, self.reason),
            None => write!(f, "malformed {} block: {}", self.encoding, self.reason),
        }
    }
}

impl std::error::Error for ParseError {}

/// One tool request found in the text, readable or not.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedCall {
    Invocation(ToolInvocation),
    Malformed(ParseError),
}

impl ParsedCall {
    /// The requested tool id, if known.
    pub fn tool_id(&self) -> Option<&str> {
        match self {
            ParsedCall::Invocation(inv) => Some(&inv.tool_id),
            ParsedCall::Malformed(err) => err.tool_id.as_deref(),
        }
    }
}

impl From<ToolInvocation> for ParsedCall {
    fn from(inv: ToolInvocation) -> Self {
        ParsedCall::Invocation(inv)
    }
}

// ─────────────────────────────────────────────
// Entry point
// ─────────────────────────────────────────────

struct Candidate {
    start: usize,
    end: usize,
    call: ParsedCall,
}

/// Extract every tool request from `text`, in the order they appear.
pub fn parse_tool_calls(text: &str) -> Vec<ParsedCall> {
    let mut found = Vec::new();
    scan_tagged(text, &mut found);
    scan_action(text, &mut found);
    scan_tool_call(text, &mut found);
    scan_mcp_invoke(text, &mut found);

    // Earliest first; on equal starts the longer match wins.
    found.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut calls = Vec::with_capacity(found.len());
    let mut covered_until = 0;
    for candidate in found {
        if candidate.start < covered_until {
            continue;
        }
        covered_until = candidate.end;
        calls.push(candidate.call);
    }
    calls
}

fn build(encoding: Encoding, tool_id: &str, args: Result<Arguments, String>) -> ParsedCall {
    if tool_id.is_empty() {
        return ParsedCall::Malformed(ParseError::new(encoding, None, "missing tool name"));
    }
    match args {
        Ok(arguments) => ParsedCall::Invocation(ToolInvocation::new(tool_id, arguments)),
        Err(reason) => ParsedCall::Malformed(ParseError::new(encoding, Some(tool_id), reason)),
    }
}

// ─────────────────────────────────────────────
// Encodings
// ─────────────────────────────────────────────

fn scan_tagged(text: &str, out: &mut Vec<Candidate>) {
    for caps in TAGGED_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let tool_id = caps.get(1).map_or("", |m| m.as_str().trim());
        let (args, end) =
            tagged_args(text, whole.end()).unwrap_or((Ok(Arguments::new()), whole.end()));
        out.push(Candidate {
            start: whole.start(),
            end,
            call: build(Encoding::Tagged, tool_id, args),
        });
    }
}

/// The `<args>` block right after `</tool>`, if there is one.
///
/// The object is read with the streaming deserializer first, so `</args>`
/// inside a JSON string does not close the block. Anything else falls back to
/// the text up to the first `</args>`.
fn tagged_args(text: &str, from: usize) -> Option<(Result<Arguments, String>, usize)> {
    let open = skip_whitespace(text, from);
    if !text[open..].starts_with(ARGS_OPEN) {
        return None;
    }
    let body = open + ARGS_OPEN.len();

    let first = skip_whitespace(text, body);
    if text[first..].starts_with('{') {
        if let (Ok(map), json_end) = json_object_at(text, first) {
            let close = skip_whitespace(text, json_end);
            if text[close..].starts_with(ARGS_CLOSE) {
                return Some((Ok(map), close + ARGS_CLOSE.len()));
            }
        }
    }

    let close = body + text[body..].find(ARGS_CLOSE)?;
    let raw = text[body..close].trim();
    let args = if raw.is_empty() {
        Ok(Arguments::new())
    } else {
        json_object(raw)
    };
    Some((args, close + ARGS_CLOSE.len()))
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    let rest = &text[from..];
    from + (rest.len() - rest.trim_start().len())
}

fn scan_action(text: &str, out: &mut Vec<Candidate>) {
    for caps in ACTION_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let use_tool_form = caps.get(1).is_some_and(|m| m.as_str() == "USE TOOL");
        let tool_id = clean_tool_id(caps.get(2).map_or("", |m| m.as_str()));

        let mut end = whole.end();
        let mut args = Ok(Arguments::new());

        match next_nonblank_line(text, end) {
            Some(line) if ARGS_PREFIX_RE.is_match(line.content) => {
                let prefix_len = ARGS_PREFIX_RE.find(line.content).map_or(0, |m| m.end());
                let inline_start = line.start + prefix_len;
                let inline = text[inline_start..line.end].trim();
                if inline.starts_with('{') {
                    let brace = inline_start + (text[inline_start..].len() - text[inline_start..].trim_start().len());
                    let (parsed, consumed_to) = json_object_at(text, brace);
                    args = parsed;
                    end = consumed_to;
                } else if inline.is_empty() {
                    let (kv, kv_end) = key_value_lines(text, line.next);
                    args = Ok(kv);
                    end = kv_end.unwrap_or(line.end);
                } else {
                    args = Err("arguments must be a JSON object or indented `key: value` lines".into());
                    end = line.end;
                }
            }
            _ if use_tool_form => {
                if let Some(after) = line_after(text, end) {
                    let (kv, kv_end) = key_value_lines(text, after);
                    args = Ok(kv);
                    end = kv_end.unwrap_or(end);
                }
            }
            _ => {}
        }

        out.push(Candidate {
            start: whole.start(),
            end,
            call: build(Encoding::Action, &tool_id, args),
        });
    }
}

fn scan_tool_call(text: &str, out: &mut Vec<Candidate>) {
    for m in TOOL_CALL_RE.find_iter(text) {
        let body_start = m.end();
        let (call, end) = if text[body_start..].starts_with('{') {
            let (parsed, end) = json_object_at(text, body_start);
            let call = match parsed {
                Ok(obj) => tool_call_from_object(&obj),
                Err(reason) => ParsedCall::Malformed(ParseError::new(Encoding::ToolCall, None, reason)),
            };
            (call, end)
        } else {
            let end = line_end(text, body_start);
            let err = ParseError::new(Encoding::ToolCall, None, "expected a JSON object");
            (ParsedCall::Malformed(err), end)
        };
        out.push(Candidate {
            start: m.start(),
            end,
            call,
        });
    }
}

fn tool_call_from_object(obj: &Arguments) -> ParsedCall {
    let tool = obj
        .get("tool")
        .or_else(|| obj.get("name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");
    let server = obj.get("server").and_then(Value::as_str).map(str::trim);
    let tool_id = qualify(server, tool);

    let args = match obj.get("args").or_else(|| obj.get("arguments")) {
        None | Some(Value::Null) => Ok(Arguments::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err("\"args\" must be a JSON object".to_string()),
    };
    if tool.is_empty() {
        return ParsedCall::Malformed(ParseError::new(
            Encoding::ToolCall,
            server,
            "missing \"tool\" field",
        ));
    }
    build(Encoding::ToolCall, &tool_id, args)
}

fn scan_mcp_invoke(text: &str, out: &mut Vec<Candidate>) {
    for caps in MCP_INVOKE_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let body = caps.get(1).map_or("", |m| m.as_str());

        let mut server = None;
        let mut tool = None;
        let mut raw_args = None;
        for p in MCP_PARAM_RE.captures_iter(body) {
            let value = p.get(2).map_or("", |m| m.as_str().trim());
            match p.get(1).map(|m| m.as_str()) {
                Some("server_name") => server = Some(value),
                Some("tool_name") => tool = Some(value),
                Some("arguments") => raw_args = Some(value),
                _ => {}
            }
        }

        let call = match tool.filter(|t| !t.is_empty()) {
            None => ParsedCall::Malformed(ParseError::new(
                Encoding::McpInvoke,
                server,
                "missing tool_name parameter",
            )),
            Some(tool) => {
                let args = match raw_args {
                    None | Some("") => Ok(Arguments::new()),
                    Some(raw) => json_object(raw),
                };
                build(Encoding::McpInvoke, &qualify(server, tool), args)
            }
        };
        out.push(Candidate {
            start: whole.start(),
            end: whole.end(),
            call,
        });
    }
}

// ─────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────

fn qualify(server: Option<&str>, tool: &str) -> String {
    match server.filter(|s| !s.is_empty()) {
        Some(server) => format!("{server}.{tool}"),
        None => tool.to_string(),
    }
}

/// `` `get-time` ``, `"get-time"` and `get-time()` all mean `get-time`.
fn clean_tool_id(raw: &str) -> String {
    let first = raw.split_whitespace().next().unwrap_or("");
    first
        .trim_matches(|c| c == '`' || c == '"' || c == '\'' || c == '*')
        .trim_end_matches("()")
        .to_string()
}

fn json_object(raw: &str) -> Result<Arguments, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("arguments must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON arguments: {e}")),
    }
}

/// Parse one JSON object starting at byte `start`; returns where it ended.
fn json_object_at(text: &str, start: usize) -> (Result<Arguments, String>, usize) {
    let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
    match stream.next() {
        Some(Ok(Value::Object(map))) => (Ok(map), start + stream.byte_offset()),
        Some(Ok(_)) => (
            Err("arguments must be a JSON object".to_string()),
            start + stream.byte_offset(),
        ),
        Some(Err(e)) => (Err(format!("invalid JSON arguments: {e}")), line_end(text, start)),
        None => (Err("missing JSON object".to_string()), line_end(text, start)),
    }
}

struct Line<'a> {
    start: usize,
    end: usize,
    /// Start of the following line (or `text.len()`).
    next: usize,
    content: &'a str,
}

fn line_end(text: &str, from: usize) -> usize {
    text[from..].find('\n').map_or(text.len(), |i| from + i)
}

fn line_at(text: &str, start: usize) -> Option<Line<'_>> {
    if start >= text.len() {
        return None;
    }
    let end = line_end(text, start);
    Some(Line {
        start,
        end,
        next: (end + 1).min(text.len()),
        content: text[start..end].trim_end_matches('\r'),
    })
}

/// Start of the line after the one containing `pos`.
fn line_after(text: &str, pos: usize) -> Option<usize> {
    let end = line_end(text, pos);
    (end < text.len()).then_some(end + 1)
}

fn next_nonblank_line(text: &str, pos: usize) -> Option<Line<'_>> {
    let mut cursor = line_after(text, pos)?;
    loop {
        let line = line_at(text, cursor)?;
        if !line.content.trim().is_empty() {
            return Some(line);
        }
        cursor = line.next;
        if cursor >= text.len() {
            return None;
        }
    }
}

/// Consume consecutive `key: value` lines starting at `start`.
/// Returns the collected arguments and the end of the last consumed line.
fn key_value_lines(text: &str, start: usize) -> (Arguments, Option<usize>) {
    let mut args = Arguments::new();
    let mut last_end = None;
    let mut cursor = start;

    while let Some(line) = line_at(text, cursor) {
        let Some(caps) = KV_LINE_RE.captures(line.content) else { break };
        let key = caps.get(1).map_or("", |m| m.as_str());
        let value = caps.get(2).map_or("", |m| m.as_str());
        if value.is_empty() || SECTION_KEYWORDS.contains(&key.to_ascii_lowercase().as_str()) {
            break;
        }
        let value = value.trim_matches(|c| c == '"' || c == '\'' || c == '`');
        args.insert(key.to_string(), Value::String(value.to_string()));
        last_end = Some(line.end);
        if line.next <= cursor {
            break;
        }
        cursor = line.next;
    }
    (args, last_end)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
