//! Last-writer-wins decision rule.

use chrono::{DateTime, Utc};

/// Determines whether a remote mutation may overwrite local entity state.
///
/// Rule: a strictly newer event timestamp wins. An equal or older timestamp
/// keeps local state; the caller records a conflict row for observability.
pub fn remote_wins(remote_timestamp: DateTime<Utc>, local_updated_at: DateTime<Utc>) -> bool {
    remote_timestamp > local_updated_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn newer_remote_wins() {
        assert!(remote_wins(ts(200), ts(100)));
    }

    #[test]
    fn older_remote_loses() {
        assert!(!remote_wins(ts(100), ts(200)));
    }

    #[test]
    fn equal_timestamps_keep_local() {
        assert!(!remote_wins(ts(100), ts(100)));
    }
}
