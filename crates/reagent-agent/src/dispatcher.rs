//! Tool Dispatcher — resolves one parsed call, validates its arguments and
//! runs the collaborator behind it.
//!
//! Every outcome is data: an unknown id, a bad argument, a collaborator
//! error, a timeout or even a panic all end up as a failed [`ToolResult`]
//! that is fed back to the model. Nothing escapes to the loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::FutureExt;
use serde_json::{Number, Value};
use thiserror::Error;
use tracing::{info, warn};

use reagent_core::config::DispatchMode;
use reagent_core::types::Message;

use crate::parser::{ParseError, ParsedCall, ToolInvocation};
use crate::tools::base::{Arguments, ParamKind, ToolDescriptor};
use crate::tools::ToolRegistry;

/// Why a tool call produced no payload.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ToolError {
    #[error("{0}")]
    Parse(ParseError),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("missing required argument '{0}'")]
    MissingArgument(String),

    #[error("argument '{name}' must be {expected}, got {got}")]
    ArgumentType {
        name: String,
        expected: ParamKind,
        got: String,
    },

    #[error("{0}")]
    Collaborator(String),
}

/// Outcome of one dispatched call.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolResult {
    pub tool_id: String,
    pub outcome: Result<String, ToolError>,
    pub elapsed: Duration,
}

impl ToolResult {
    pub fn ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The success payload, or the error rendered as text.
    pub fn payload(&self) -> String {
        match &self.outcome {
            Ok(payload) => payload.clone(),
            Err(e) => e.to_string(),
        }
    }

    /// The `tool` message fed back to the model.
    pub fn to_message(&self) -> Message {
        match &self.outcome {
            Ok(payload) => Message::tool(format!("{} returned:\n{}", self.tool_id, payload)),
            Err(e) => Message::tool(format!("{} failed: {}", self.tool_id, e)),
        }
    }
}

// ─────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    tool_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, tool_timeout: Duration) -> Self {
        Self {
            registry,
            tool_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Dispatch one parsed call. Malformed blocks come back as `ToolError::Parse`.
    pub async fn dispatch(&self, call: &ParsedCall) -> ToolResult {
        match call {
            ParsedCall::Invocation(inv) => self.dispatch_invocation(inv).await,
            ParsedCall::Malformed(err) => {
                warn!(error = %err, "malformed tool call");
                ToolResult {
                    tool_id: err.tool_id.clone().unwrap_or_else(|| "(unparsed)".into()),
                    outcome: Err(ToolError::Parse(err.clone())),
                    elapsed: Duration::ZERO,
                }
            }
        }
    }

    /// Dispatch a batch, returning results in the same order as `calls`.
    pub async fn dispatch_all(&self, calls: &[ParsedCall], mode: DispatchMode) -> Vec<ToolResult> {
        match mode {
            DispatchMode::Sequential => {
                let mut results = Vec::with_capacity(calls.len());
                for call in calls {
                    results.push(self.dispatch(call).await);
                }
                results
            }
            DispatchMode::Concurrent => join_all(calls.iter().map(|c| self.dispatch(c))).await,
        }
    }

    pub async fn dispatch_invocation(&self, inv: &ToolInvocation) -> ToolResult {
        let started = Instant::now();
        let outcome = self.run(inv).await;
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        match &outcome {
            Ok(payload) => info!(
                tool = %inv.tool_id,
                ok = true,
                elapsed_ms,
                result_len = payload.len(),
                "tool dispatched"
            ),
            Err(e) => warn!(
                tool = %inv.tool_id,
                ok = false,
                elapsed_ms,
                error = %e,
                "tool dispatched"
            ),
        }

        ToolResult {
            tool_id: inv.tool_id.clone(),
            outcome,
            elapsed,
        }
    }

    async fn run(&self, inv: &ToolInvocation) -> Result<String, ToolError> {
        let descriptor = self
            .registry
            .resolve(&inv.tool_id)
            .ok_or_else(|| ToolError::UnknownTool(inv.tool_id.clone()))?;
        let args = validate(descriptor, &inv.arguments)?;

        let collaborator = self
            .registry
            .collaborator(&descriptor.collaborator)
            .ok_or_else(|| ToolError::UnknownTool(inv.tool_id.clone()))?;

        let call = AssertUnwindSafe(collaborator.invoke(&descriptor.operation, &args)).catch_unwind();
        match tokio::time::timeout(self.tool_timeout, call).await {
            Err(_) => Err(ToolError::Collaborator(format!(
                "timeout after {:.1}s",
                self.tool_timeout.as_secs_f64()
            ))),
            Ok(Err(panic)) => Err(ToolError::Collaborator(format!(
                "collaborator panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Ok(Ok(Err(e))) => Err(ToolError::Collaborator(format!("{e:#}"))),
            Ok(Ok(Ok(payload))) => Ok(payload),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

// ─────────────────────────────────────────────
// Argument validation
// ─────────────────────────────────────────────

/// Check presence and coerce declared params. `null` counts as absent;
/// arguments the descriptor doesn't declare pass through untouched.
fn validate(descriptor: &ToolDescriptor, args: &Arguments) -> Result<Arguments, ToolError> {
    let mut checked = args.clone();
    for param in &descriptor.params {
        match args.get(&param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(ToolError::MissingArgument(param.name.clone()));
                }
                checked.remove(&param.name);
            }
            Some(value) => {
                let coerced = coerce(param.kind, value).ok_or_else(|| ToolError::ArgumentType {
                    name: param.name.clone(),
                    expected: param.kind,
                    got: describe_value(value),
                })?;
                checked.insert(param.name.clone(), coerced);
            }
        }
    }
    Ok(checked)
}

fn coerce(kind: ParamKind, value: &Value) -> Option<Value> {
    match (kind, value) {
        (ParamKind::String, Value::String(_)) => Some(value.clone()),
        (ParamKind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ParamKind::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

        (ParamKind::Integer, Value::Number(n)) => integral(n.as_f64()?, n.as_i64()),
        (ParamKind::Integer, Value::String(s)) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => Some(Value::from(i)),
                Err(_) => integral(s.parse::<f64>().ok()?, None),
            }
        }

        (ParamKind::Number, Value::Number(_)) => Some(value.clone()),
        (ParamKind::Number, Value::String(s)) => {
            let f = s.trim().parse::<f64>().ok()?;
            Number::from_f64(f).map(Value::Number)
        }

        (ParamKind::Boolean, Value::Bool(_)) => Some(value.clone()),
        (ParamKind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(Value::Bool(true)),
            "false" | "no" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        (ParamKind::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(1) => Some(Value::Bool(true)),
            Some(0) => Some(Value::Bool(false)),
            _ => None,
        },

        _ => None,
    }
}

/// `3`, `3.0` and `"3"` are integers; `3.5` is not.
fn integral(f: f64, exact: Option<i64>) -> Option<Value> {
    if let Some(i) = exact {
        return Some(Value::from(i));
    }
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        None
    }
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(_) => "array".into(),
        Value::Object(_) => "object".into(),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_tool_calls, Encoding};
    use crate::testing::echo_registry;
    use serde_json::json;

    fn dispatcher() -> (Dispatcher, Arc<crate::testing::EchoCollaborator>) {
        let (registry, collab) = echo_registry();
        (Dispatcher::new(registry, Duration::from_secs(5)), collab)
    }

    fn call(tool_id: &str, args: Value) -> ParsedCall {
        ParsedCall::Invocation(ToolInvocation::new(tool_id, args.as_object().cloned().unwrap()))
    }

    #[tokio::test]
    async fn test_get_time_scenario() {
        let (d, _) = dispatcher();
        let calls = parse_tool_calls("<tool>get-time</tool><args>{}</args>");
        let result = d.dispatch(&calls[0]).await;
        assert_eq!(result.tool_id, "get-time");
        assert_eq!(result.outcome, Ok("12:00".into()));
        let msg = result.to_message();
        assert_eq!(msg.role, reagent_core::types::Role::Tool);
        assert!(msg.content.contains("12:00"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (d, collab) = dispatcher();
        let result = d.dispatch(&call("teleport", json!({}))).await;
        assert!(!result.ok());
        assert_eq!(result.outcome, Err(ToolError::UnknownTool("teleport".into())));
        assert_eq!(collab.invocations(), 0);
    }

    #[tokio::test]
    async fn test_missing_argument_skips_collaborator() {
        let (d, collab) = dispatcher();
        let result = d.dispatch(&call("echo", json!({}))).await;
        assert_eq!(result.outcome, Err(ToolError::MissingArgument("text".into())));

        let result = d.dispatch(&call("echo", json!({"text": null}))).await;
        assert_eq!(result.outcome, Err(ToolError::MissingArgument("text".into())));
        assert_eq!(collab.invocations(), 0);
    }

    #[tokio::test]
    async fn test_numeric_strings_are_coerced() {
        let (d, _) = dispatcher();
        let result = d.dispatch(&call("add-numbers", json!({"a": "40", "b": 2.0}))).await;
        assert_eq!(result.outcome, Ok("42".into()));
    }

    #[tokio::test]
    async fn test_coercion_failure_is_argument_type_error() {
        let (d, collab) = dispatcher();
        let result = d.dispatch(&call("add-numbers", json!({"a": "forty", "b": 2}))).await;
        match result.outcome {
            Err(ToolError::ArgumentType { name, expected, got }) => {
                assert_eq!(name, "a");
                assert_eq!(expected, ParamKind::Integer);
                assert!(got.contains("forty"));
            }
            other => panic!("expected ArgumentType, got {other:?}"),
        }

        let result = d.dispatch(&call("add-numbers", json!({"a": 1.5, "b": 2}))).await;
        assert!(matches!(result.outcome, Err(ToolError::ArgumentType { .. })));

        let result = d.dispatch(&call("echo", json!({"text": ["a"]}))).await;
        assert!(matches!(result.outcome, Err(ToolError::ArgumentType { .. })));
        assert_eq!(collab.invocations(), 0);
    }

    #[tokio::test]
    async fn test_boolean_and_string_coercion() {
        let (d, _) = dispatcher();
        let result = d.dispatch(&call("flag", json!({"on": "yes"}))).await;
        assert_eq!(result.outcome, Ok("on=true".into()));

        let result = d.dispatch(&call("flag", json!({"on": "maybe"}))).await;
        assert!(matches!(result.outcome, Err(ToolError::ArgumentType { .. })));

        let result = d.dispatch(&call("echo", json!({"text": 7}))).await;
        assert_eq!(result.outcome, Ok("7".into()));
    }

    #[tokio::test]
    async fn test_collaborator_error_is_captured() {
        let (d, _) = dispatcher();
        let result = d.dispatch(&call("fail", json!({}))).await;
        assert_eq!(
            result.outcome,
            Err(ToolError::Collaborator("intentional failure".into()))
        );
    }

    #[tokio::test]
    async fn test_collaborator_reporting_timeout() {
        let (d, _) = dispatcher();
        let result = d.dispatch(&call("browse-url", json!({"url": "https://slow.example"}))).await;
        assert_eq!(result.outcome, Err(ToolError::Collaborator("timeout".into())));
    }

    #[tokio::test]
    async fn test_dispatch_timeout() {
        let (registry, _) = echo_registry();
        let d = Dispatcher::new(registry, Duration::from_millis(50));
        let result = d.dispatch(&call("slow", json!({"ms": 2_000}))).await;
        match result.outcome {
            Err(ToolError::Collaborator(msg)) => assert!(msg.contains("timeout")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let (d, _) = dispatcher();
        let result = d.dispatch(&call("explode", json!({}))).await;
        match result.outcome {
            Err(ToolError::Collaborator(msg)) => assert!(msg.contains("collaborator blew up")),
            other => panic!("expected collaborator error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_call_reported_as_parse_error() {
        let (d, _) = dispatcher();
        let calls = parse_tool_calls("<tool>echo</tool><args>{oops</args>");
        let result = d.dispatch(&calls[0]).await;
        assert_eq!(result.tool_id, "echo");
        match result.outcome {
            Err(ToolError::Parse(ref err)) => assert_eq!(err.encoding, Encoding::Tagged),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(result.to_message().content.contains("malformed"));
    }

    #[tokio::test]
    async fn test_qualified_name_resolves() {
        let (d, _) = dispatcher();
        let calls = parse_tool_calls(r#"TOOL_CALL: {"server": "test", "tool": "echo", "args": {"text": "hi"}}"#);
        let result = d.dispatch(&calls[0]).await;
        assert_eq!(result.outcome, Ok("hi".into()));
    }

    #[tokio::test]
    async fn test_dispatch_all_preserves_order_in_both_modes() {
        let (d, _) = dispatcher();
        let calls = vec![
            call("slow", json!({"ms": 80})),
            call("echo", json!({"text": "second"})),
            call("nope", json!({})),
        ];

        for mode in [DispatchMode::Sequential, DispatchMode::Concurrent] {
            let results = d.dispatch_all(&calls, mode).await;
            let ids: Vec<&str> = results.iter().map(|r| r.tool_id.as_str()).collect();
            assert_eq!(ids, vec!["slow", "echo", "nope"]);
            assert_eq!(results[0].outcome, Ok("done".into()));
            assert_eq!(results[1].outcome, Ok("second".into()));
            assert!(!results[2].ok());
        }
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_overlaps() {
        let (d, _) = dispatcher();
        let calls: Vec<ParsedCall> = (0..4).map(|_| call("slow", json!({"ms": 200}))).collect();

        let started = Instant::now();
        let results = d.dispatch_all(&calls, DispatchMode::Concurrent).await;
        assert!(results.iter().all(ToolResult::ok));
        assert!(started.elapsed() < Duration::from_millis(700));
    }

    #[test]
    fn test_coerce_table() {
        assert_eq!(coerce(ParamKind::Integer, &json!("  12 ")), Some(json!(12)));
        assert_eq!(coerce(ParamKind::Integer, &json!("3.0")), Some(json!(3)));
        assert_eq!(coerce(ParamKind::Integer, &json!(true)), None);
        assert_eq!(coerce(ParamKind::Number, &json!("2.5")), Some(json!(2.5)));
        assert_eq!(coerce(ParamKind::Number, &json!("NaN")), None);
        assert_eq!(coerce(ParamKind::Boolean, &json!("No")), Some(json!(false)));
        assert_eq!(coerce(ParamKind::Boolean, &json!(1)), Some(json!(true)));
        assert_eq!(coerce(ParamKind::String, &json!(false)), Some(json!("false")));
        assert_eq!(coerce(ParamKind::String, &json!({"a": 1})), None);
    }
}
