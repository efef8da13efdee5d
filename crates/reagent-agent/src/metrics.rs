//! Per-run tool statistics.
//!
//! Every dispatched call (prefetch included) is recorded against its tool id.
//! The totals ride on [`LoopOutcome`](crate::LoopOutcome) and are logged when
//! the run finishes.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::dispatcher::ToolResult;

/// Counters for one tool id.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ToolStats {
    pub calls: u32,
    pub failures: u32,
    /// Wall time spent in the tool, summed over calls.
    #[serde(rename = "total_ms", serialize_with = "as_millis")]
    pub total: Duration,
}

impl ToolStats {
    pub fn successes(&self) -> u32 {
        self.calls - self.failures
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Tool id → [`ToolStats`], ordered by id.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ToolMetrics {
    tools: BTreeMap<String, ToolStats>,
}

impl ToolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &ToolResult) {
        let stats = self.tools.entry(result.tool_id.clone()).or_default();
        stats.calls += 1;
        if !result.ok() {
            stats.failures += 1;
        }
        stats.total += result.elapsed;
    }

    pub fn record_all<'a>(&mut self, results: impl IntoIterator<Item = &'a ToolResult>) {
        for result in results {
            self.record(result);
        }
    }

    pub fn get(&self, tool_id: &str) -> Option<&ToolStats> {
        self.tools.get(tool_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ToolStats)> {
        self.tools.iter().map(|(id, stats)| (id.as_str(), stats))
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn total_calls(&self) -> u32 {
        self.tools.values().map(|s| s.calls).sum()
    }

    pub fn total_failures(&self) -> u32 {
        self.tools.values().map(|s| s.failures).sum()
    }

    pub fn total_time(&self) -> Duration {
        self.tools.values().map(|s| s.total).sum()
    }
}

/// `get-time×2 (3ms), browse-url×1 (1 failed, 840ms)`, or `none`.
impl fmt::Display for ToolMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tools.is_empty() {
            return f.write_str("none");
        }
        for (i, (id, stats)) in self.tools.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{id}×{} (", stats.calls)?;
            if stats.failures > 0 {
                write!(f, "{} failed, ", stats.failures)?;
            }
            write!(f, "{}ms)", stats.total.as_millis())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::ToolError;

    fn result(tool_id: &str, ok: bool, ms: u64) -> ToolResult {
        ToolResult {
            tool_id: tool_id.into(),
            outcome: if ok {
                Ok("done".into())
            } else {
                Err(ToolError::Collaborator("boom".into()))
            },
            elapsed: Duration::from_millis(ms),
        }
    }

    #[test]
    fn test_record_accumulates_per_tool() {
        let mut metrics = ToolMetrics::new();
        metrics.record_all(&[
            result("get-time", true, 2),
            result("browse-url", false, 300),
            result("get-time", true, 5),
        ]);

        let time = metrics.get("get-time").unwrap();
        assert_eq!(time.calls, 2);
        assert_eq!(time.failures, 0);
        assert_eq!(time.total, Duration::from_millis(7));

        let browse = metrics.get("browse-url").unwrap();
        assert_eq!((browse.calls, browse.failures, browse.successes()), (1, 1, 0));

        assert_eq!(metrics.total_calls(), 3);
        assert_eq!(metrics.total_failures(), 1);
        assert_eq!(metrics.total_time(), Duration::from_millis(307));
        assert!(metrics.get("search-web").is_none());
    }

    #[test]
    fn test_display_and_json_shape() {
        let mut metrics = ToolMetrics::new();
        assert_eq!(metrics.to_string(), "none");

        metrics.record(&result("get-time", true, 3));
        metrics.record(&result("browse-url", false, 840));
        assert_eq!(
            metrics.to_string(),
            "browse-url×1 (1 failed, 840ms), get-time×1 (3ms)"
        );

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "browse-url": {"calls": 1, "failures": 1, "total_ms": 840},
                "get-time": {"calls": 1, "failures": 0, "total_ms": 3}
            })
        );
    }
}
