//! Defaulting and coercion of loosely typed task fields.
//!
//! Clients send whatever JSON they like for these fields; the rules below
//! decide what the daemon actually receives.

use chrono::{Local, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

/// Target used when the client leaves `taskTarget` empty.
pub const LOCALHOST: &str = "localhost";

/// Format accepted for `taskScheduleNotBefore`.
pub const NOT_BEFORE_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format the daemon expects for the not-before time.
pub const NOT_BEFORE_WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M";

const HOURS_PER_DAY: u32 = 24;

/// Render a JSON field as text: strings verbatim, `null` as empty, anything
/// else in its JSON form.
pub fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Whether a field counts as "not provided" for partial updates.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

pub fn target_or_localhost(target: &str) -> String {
    if target.is_empty() {
        LOCALHOST.to_string()
    } else {
        target.to_string()
    }
}

/// Online remediation is on only for `1`, `"y"`, `"Y"` and `"yes"`.
///
/// JSON `true` and `1.0` compare equal to `1` and are accepted as well.
pub fn online_remediation(value: &Value) -> bool {
    match value {
        Value::String(s) => matches!(s.as_str(), "y" | "Y" | "yes"),
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::Bool(b) => *b,
        _ => false,
    }
}

/// Parse `taskScheduleNotBefore`, falling back to the current local time when
/// it is empty or unparseable.
pub fn schedule_not_before(input: &str) -> NaiveDateTime {
    schedule_not_before_at(input, Local::now().naive_local())
}

/// [`schedule_not_before`] with an explicit "now".
pub fn schedule_not_before_at(input: &str, now: NaiveDateTime) -> NaiveDateTime {
    if input.is_empty() {
        return now;
    }
    match NaiveDateTime::parse_from_str(input, NOT_BEFORE_INPUT_FORMAT) {
        Ok(at) => at,
        Err(e) => {
            debug!(input, error = %e, "Unparseable schedule start, using now");
            now
        }
    }
}

pub fn not_before_wire(at: NaiveDateTime) -> String {
    at.format(NOT_BEFORE_WIRE_FORMAT).to_string()
}

/// How often a task repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatAfter {
    Disabled,
    Hours(u32),
}

impl RepeatAfter {
    /// Parse the repeat interval: empty disables repetition, `@daily`,
    /// `@weekly` and `@monthly` are shorthands, anything else must be a whole
    /// number of hours or repetition is disabled.
    pub fn parse(input: &str) -> Self {
        match input {
            "" => RepeatAfter::Disabled,
            "@daily" => RepeatAfter::Hours(HOURS_PER_DAY),
            "@weekly" => RepeatAfter::Hours(7 * HOURS_PER_DAY),
            "@monthly" => RepeatAfter::Hours(30 * HOURS_PER_DAY),
            other => match other.trim().parse::<u32>() {
                Ok(0) | Err(_) => RepeatAfter::Disabled,
                Ok(hours) => RepeatAfter::Hours(hours),
            },
        }
    }

    /// The daemon's encoding: 0 means no repetition.
    pub fn hours(self) -> u32 {
        match self {
            RepeatAfter::Disabled => 0,
            RepeatAfter::Hours(h) => h,
        }
    }
}
