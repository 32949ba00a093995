//! Wire formats and engine status models.
//!
//! Event frames use snake_case keys with `type` for the event type; the pull
//! request/response bodies use the relay's camelCase cursor fields. Unknown
//! keys are ignored on decode in both directions.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use taskdeck_core::events::{Event, RemoteEvent};
use taskdeck_core::sync::parse_server_timestamp;

/// One event as it crosses the wire, for both push and socket frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub id: String,
    pub user_id: String,
    pub device_id: String,
    pub app_id: String,
    /// RFC-3339 with fractional seconds; the relay may answer at up to
    /// nanosecond precision.
    pub ts: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub payload_version: Option<i32>,
}

impl WireEvent {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            user_id: event.user_id.clone(),
            device_id: event.device_id.clone(),
            app_id: event.app_id.clone(),
            ts: event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            payload_version: Some(event.payload_version),
        }
    }

    /// Decode into a projectable event. An unparseable timestamp is stamped
    /// with `now` and logged; the event still applies, in degraded mode.
    pub fn into_remote(self, now: DateTime<Utc>) -> RemoteEvent {
        let timestamp = match parse_server_timestamp(&self.ts) {
            Some(parsed) => parsed,
            None => {
                log::warn!(
                    "[sync] unparseable event timestamp '{}' on {}; stamping with local time",
                    self.ts,
                    self.id
                );
                now
            }
        };
        RemoteEvent {
            id: self.id,
            event_type: self.event_type,
            user_id: self.user_id,
            device_id: self.device_id,
            app_id: self.app_id,
            timestamp,
            payload: self.payload,
            payload_version: self.payload_version.unwrap_or(0),
        }
    }
}

/// `{events: [...]}` envelope shared by HTTP push bodies and socket frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub events: Vec<WireEvent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushResponse {
    pub acknowledged: Vec<String>,
    #[serde(default)]
    pub rejected: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequest {
    pub since: String,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    pub events: Option<Vec<WireEvent>>,
    #[serde(default)]
    pub next_checkpoint: Option<String>,
    pub has_more: bool,
}

/// Connection lifecycle of the sync engine. Exactly one connection exists at
/// a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Point-in-time engine health for status surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub connection: ConnectionStatus,
    pub pending_events: i64,
    pub checkpoint: Option<String>,
    pub last_push_at: Option<DateTime<Utc>>,
    pub last_pull_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn wire_event_uses_snake_case_and_type_key() {
        let wire = WireEvent {
            id: "e1".into(),
            user_id: "u1".into(),
            device_id: "d1".into(),
            app_id: "taskdeck".into(),
            ts: "2026-03-01T10:20:30.000Z".into(),
            event_type: "stack.updated".into(),
            payload: serde_json::json!({"id": "s1"}),
            payload_version: Some(1),
        };
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["type"], "stack.updated");
        assert_eq!(value["user_id"], "u1");
        assert_eq!(value["payload_version"], 1);
        assert!(value.get("event_type").is_none());
    }

    #[test]
    fn unknown_top_level_keys_are_ignored() {
        let wire: WireEvent = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "user_id": "u1",
            "device_id": "d1",
            "app_id": "taskdeck",
            "ts": "2026-03-01T10:20:30Z",
            "type": "stack.updated",
            "payload": {"id": "s1"},
            "payload_version": 1,
            "server_seq": 42,
        }))
        .unwrap();
        assert_eq!(wire.event_type, "stack.updated");
    }

    #[test]
    fn missing_payload_version_maps_to_zero() {
        let wire: WireEvent = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "user_id": "u1",
            "device_id": "d1",
            "app_id": "taskdeck",
            "ts": "2026-03-01T10:20:30Z",
            "type": "stack.updated",
            "payload": {},
        }))
        .unwrap();
        let remote = wire.into_remote(Utc::now());
        assert_eq!(remote.payload_version, 0);
    }

    #[test]
    fn garbage_timestamps_fall_back_to_now() {
        let wire: WireEvent = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "user_id": "u1",
            "device_id": "d1",
            "app_id": "taskdeck",
            "ts": "not-a-time",
            "type": "stack.updated",
            "payload": {},
        }))
        .unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(wire.into_remote(now).timestamp, now);
    }

    #[test]
    fn pull_response_parses_camel_case_cursor_fields() {
        let response: PullResponse = serde_json::from_str(
            r#"{"events": null, "nextCheckpoint": "c1", "hasMore": false}"#,
        )
        .unwrap();
        assert!(response.events.is_none());
        assert_eq!(response.next_checkpoint.as_deref(), Some("c1"));
        assert!(!response.has_more);
    }

    #[test]
    fn push_response_defaults_optional_lists() {
        let response: PushResponse =
            serde_json::from_str(r#"{"acknowledged": ["e1"]}"#).unwrap();
        assert_eq!(response.acknowledged, vec!["e1"]);
        assert!(response.rejected.is_empty());
        assert!(response.errors.is_empty());
    }
}
