//! Server timestamp parsing.
//!
//! The relay emits RFC-3339 with variable sub-second precision, up to
//! nanoseconds and occasionally beyond what a strict parser accepts. Overlong
//! fractions are truncated to milliseconds before reparsing.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

fn overlong_fraction() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.(\d{3})\d+").expect("valid fraction regex"))
}

/// Parse a relay timestamp at second, millisecond, or nanosecond precision.
///
/// Returns `None` when the value is not a recognizable RFC-3339 instant;
/// callers log a warning and stamp with the current time (degraded mode).
pub fn parse_server_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }

    // Truncate the fractional part to milliseconds and retry.
    let truncated = overlong_fraction().replace(trimmed, ".$1");
    DateTime::parse_from_rfc3339(&truncated)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
