//! Clock collaborator — current time, date and calendar facts at a fixed UTC offset.

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Utc, Weekday};
use serde_json::{json, Value};

use reagent_core::config::schema::ClockConfig;

use super::base::{
    optional_i64, optional_string, unknown_operation, Arguments, Collaborator, ParamKind,
    ParamSpec, ToolDescriptor,
};

const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse `"+05:30"`, `"-0800"`, `"+2"`, `"UTC"` or `"Z"` into an offset.
pub fn parse_utc_offset(raw: &str) -> anyhow::Result<FixedOffset> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("utc") || s.eq_ignore_ascii_case("z") {
        return Ok(Utc.fix());
    }

    let invalid = || anyhow::anyhow!("invalid UTC offset '{raw}' (expected e.g. +02:00)");
    let (sign, rest) = match s.as_bytes()[0] {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 && rest.is_ascii() => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

fn timezone_label(offset: &FixedOffset) -> String {
    if offset.local_minus_utc() == 0 {
        "UTC".into()
    } else {
        format!("UTC{offset}")
    }
}

// ─────────────────────────────────────────────
// Operations (pure, for a given instant)
// ─────────────────────────────────────────────

pub fn current_time(now: &DateTime<FixedOffset>) -> Value {
    json!({
        "datetime": now.to_rfc3339(),
        "date": now.format("%Y-%m-%d").to_string(),
        "time": now.format("%H:%M:%S").to_string(),
        "time_12h": now.format("%I:%M:%S %p").to_string(),
        "day_of_week": now.format("%A").to_string(),
        "timezone": timezone_label(now.offset()),
        "timestamp": now.timestamp(),
    })
}

pub fn current_date(now: &DateTime<FixedOffset>) -> Value {
    json!({
        "date": now.format("%Y-%m-%d").to_string(),
        "day": now.day(),
        "month": now.month(),
        "year": now.year(),
        "day_of_week": now.format("%A").to_string(),
        "day_of_week_short": now.format("%a").to_string(),
        "month_name": now.format("%B").to_string(),
        "month_name_short": now.format("%b").to_string(),
    })
}

pub fn day_info(now: &DateTime<FixedOffset>) -> Value {
    json!({
        "date": now.format("%Y-%m-%d").to_string(),
        "day_of_week": now.format("%A").to_string(),
        "day_of_month": now.day(),
        "day_of_year": now.ordinal(),
        "week_number": now.iso_week().week(),
        "is_weekend": matches!(now.weekday(), Weekday::Sat | Weekday::Sun),
        "quarter": (now.month() - 1) / 3 + 1,
    })
}

/// strftime-style formatting; bad specifiers are an error rather than a panic.
pub fn format_datetime(now: &DateTime<FixedOffset>, format: &str) -> anyhow::Result<String> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        anyhow::bail!("invalid format string '{format}'");
    }
    Ok(now.format_with_items(StrftimeItems::new(format)).to_string())
}

pub fn from_timestamp(timestamp: i64, offset: &FixedOffset) -> anyhow::Result<Value> {
    let dt = DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| anyhow::anyhow!("timestamp {timestamp} is out of range"))?
        .with_timezone(offset);
    Ok(json!({
        "datetime": dt.to_rfc3339(),
        "date": dt.format("%Y-%m-%d").to_string(),
        "time": dt.format("%H:%M:%S").to_string(),
        "day_of_week": dt.format("%A").to_string(),
    }))
}

// ─────────────────────────────────────────────
// ClockCollaborator
// ─────────────────────────────────────────────

pub struct ClockCollaborator {
    offset: FixedOffset,
}

impl ClockCollaborator {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn from_config(config: &ClockConfig) -> anyhow::Result<Self> {
        Ok(Self::new(parse_utc_offset(&config.utc_offset)?))
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

#[async_trait]
impl Collaborator for ClockCollaborator {
    fn name(&self) -> &str {
        "clock"
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "get-time",
                "clock",
                "get_current_time",
                "Current date and time (24h and 12h), weekday and timezone",
            ),
            ToolDescriptor::new(
                "get-date",
                "clock",
                "get_current_date",
                "Today's date with day, month, year and names",
            ),
            ToolDescriptor::new(
                "get-day-info",
                "clock",
                "get_day_info",
                "Day of year, ISO week number, quarter and whether today is a weekend",
            ),
            ToolDescriptor::new(
                "format-datetime",
                "clock",
                "format_datetime",
                "Format the current time with a strftime pattern",
            )
            .param(ParamSpec::optional(
                "format_string",
                ParamKind::String,
                "strftime pattern (default %Y-%m-%d %H:%M:%S)",
            )),
            ToolDescriptor::new(
                "from-timestamp",
                "clock",
                "from_timestamp",
                "Convert a Unix timestamp to a date and time",
            )
            .param(ParamSpec::required(
                "timestamp",
                ParamKind::Integer,
                "Seconds since the Unix epoch",
            )),
        ]
    }

    async fn invoke(&self, operation: &str, args: &Arguments) -> anyhow::Result<String> {
        let now = self.now();
        let value = match operation {
            "get_current_time" => current_time(&now),
            "get_current_date" => current_date(&now),
            "get_day_info" => day_info(&now),
            "format_datetime" => {
                let format = optional_string(args, "format_string")
                    .unwrap_or_else(|| DEFAULT_FORMAT.to_string());
                return format_datetime(&now, &format);
            }
            "from_timestamp" => {
                let ts = optional_i64(args, "timestamp")
                    .ok_or_else(|| anyhow::anyhow!("Missing required argument: timestamp"))?;
                from_timestamp(ts, &self.offset)?
            }
            other => return Err(unknown_operation(self.name(), other)),
        };
        Ok(serde_json::to_string_pretty(&value)?)
    }
}
