//! Event model and type constants.

use crate::errors::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload schema version stamped on every locally recorded event. Inbound
/// events below this version are dropped at the boundary.
pub const CURRENT_PAYLOAD_VERSION: i32 = 1;

/// Dotted event type strings. The projector dispatches on these; unknown
/// types coming off the wire are ignored for forward compatibility.
pub mod event_types {
    pub const STACK_CREATED: &str = "stack.created";
    pub const STACK_UPDATED: &str = "stack.updated";
    pub const STACK_DELETED: &str = "stack.deleted";
    pub const STACK_DISCARDED: &str = "stack.discarded";
    pub const STACK_ACTIVATED: &str = "stack.activated";
    pub const STACK_DEACTIVATED: &str = "stack.deactivated";
    pub const STACK_COMPLETED: &str = "stack.completed";
    pub const STACK_CLOSED: &str = "stack.closed";
    pub const STACK_ARCHIVED: &str = "stack.archived";
    pub const STACK_REORDERED: &str = "stack.reordered";
    pub const STACK_ARC_ASSIGNED: &str = "stack.arc_assigned";

    pub const TASK_CREATED: &str = "task.created";
    pub const TASK_UPDATED: &str = "task.updated";
    pub const TASK_DELETED: &str = "task.deleted";
    pub const TASK_ACTIVATED: &str = "task.activated";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_CLOSED: &str = "task.closed";
    pub const TASK_REORDERED: &str = "task.reordered";

    pub const REMINDER_CREATED: &str = "reminder.created";
    pub const REMINDER_UPDATED: &str = "reminder.updated";
    pub const REMINDER_DELETED: &str = "reminder.deleted";
    pub const REMINDER_SNOOZED: &str = "reminder.snoozed";
    pub const REMINDER_FIRED: &str = "reminder.fired";
    pub const REMINDER_DISMISSED: &str = "reminder.dismissed";

    pub const TAG_CREATED: &str = "tag.created";
    pub const TAG_UPDATED: &str = "tag.updated";
    pub const TAG_DELETED: &str = "tag.deleted";

    pub const ARC_CREATED: &str = "arc.created";
    pub const ARC_UPDATED: &str = "arc.updated";
    pub const ARC_DELETED: &str = "arc.deleted";
    pub const ARC_REORDERED: &str = "arc.reordered";

    pub const ATTACHMENT_CREATED: &str = "attachment.created";
    pub const ATTACHMENT_UPDATED: &str = "attachment.updated";
    pub const ATTACHMENT_DELETED: &str = "attachment.deleted";

    pub const DEVICE_REGISTERED: &str = "device.registered";
    pub const DEVICE_UPDATED: &str = "device.updated";
}

/// Local delivery lifecycle of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSyncStatus {
    /// Awaiting relay acknowledgement.
    Pending,
    /// Acknowledged by the relay, or received from it.
    Synced,
    /// Terminally rejected by the relay; kept for audit, never re-pushed.
    Dead,
}

impl EventSyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSyncStatus::Pending => "pending",
            EventSyncStatus::Synced => "synced",
            EventSyncStatus::Dead => "dead",
        }
    }

    pub fn parse(value: &str) -> EventSyncStatus {
        match value {
            "synced" => EventSyncStatus::Synced,
            "dead" => EventSyncStatus::Dead,
            _ => EventSyncStatus::Pending,
        }
    }
}

/// An immutable record of a state change, persisted locally and replicated
/// through the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub entity_id: Option<String>,
    pub user_id: String,
    pub device_id: String,
    pub app_id: String,
    pub payload_version: i32,
    pub is_synced: bool,
    pub synced_at: Option<DateTime<Utc>>,
    pub status: EventSyncStatus,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The caller-supplied part of an event; identity and timestamps are stamped
/// by the log when the row is written.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub event_type: String,
    pub entity_id: Option<String>,
    pub payload: serde_json::Value,
}

impl EventDraft {
    pub fn new(
        event_type: &str,
        entity_id: Option<String>,
        payload: &impl Serialize,
    ) -> Result<Self> {
        Ok(Self {
            event_type: event_type.to_string(),
            entity_id,
            payload: serde_json::to_value(payload)?,
        })
    }
}

/// A decoded inbound event, ready for projection. Produced by the transport
/// from wire frames; `entity_id` is resolved from the payload by handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEvent {
    pub id: String,
    pub event_type: String,
    pub user_id: String,
    pub device_id: String,
    pub app_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub payload_version: i32,
}
