//! Versioned payload envelopes carried inside events.
//!
//! Envelopes are serde camelCase JSON. Unknown payload keys are ignored on
//! decode so newer devices can ship additional fields without breaking older
//! ones; structural changes bump `CURRENT_PAYLOAD_VERSION` instead.

use crate::arcs::{ArcStatus, StoryArc};
use crate::attachments::{Attachment, UploadState};
use crate::devices::Device;
use crate::reminders::{ParentType, Reminder, ReminderStatus};
use crate::stacks::{Stack, StackStatus};
use crate::tags::Tag;
use crate::tasks::{QueueTask, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full stack state, for `stack.created` / `stack.updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackEventPayload {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: StackStatus,
    #[serde(default)]
    pub priority: Option<i32>,
    pub sort_order: i32,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub active_task_id: Option<String>,
    #[serde(default)]
    pub arc_id: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Stack> for StackEventPayload {
    fn from(stack: &Stack) -> Self {
        Self {
            id: stack.id.clone(),
            title: stack.title.clone(),
            description: stack.description.clone(),
            status: stack.status,
            priority: stack.priority,
            sort_order: stack.sort_order,
            is_draft: stack.is_draft,
            is_active: stack.is_active,
            active_task_id: stack.active_task_id.clone(),
            arc_id: stack.arc_id.clone(),
            tag_ids: stack.tag_ids.clone(),
            created_at: Some(stack.created_at),
        }
    }
}

/// Full task state, for `task.created` / `task.updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEventPayload {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Option<i32>,
    pub sort_order: i32,
    #[serde(default)]
    pub last_active_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stack_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&QueueTask> for TaskEventPayload {
    fn from(task: &QueueTask) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            sort_order: task.sort_order,
            last_active_time: task.last_active_time,
            stack_id: task.stack_id.clone(),
            created_at: Some(task.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderEventPayload {
    pub id: String,
    pub parent_id: String,
    pub parent_type: ParentType,
    pub status: ReminderStatus,
    pub remind_at: DateTime<Utc>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Reminder> for ReminderEventPayload {
    fn from(reminder: &Reminder) -> Self {
        Self {
            id: reminder.id.clone(),
            parent_id: reminder.parent_id.clone(),
            parent_type: reminder.parent_type,
            status: reminder.status,
            remind_at: reminder.remind_at,
            created_at: Some(reminder.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagEventPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Tag> for TagEventPayload {
    fn from(tag: &Tag) -> Self {
        Self {
            id: tag.id.clone(),
            name: tag.name.clone(),
            color_hex: tag.color_hex.clone(),
            created_at: Some(tag.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcEventPayload {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: ArcStatus,
    pub sort_order: i32,
    #[serde(default)]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&StoryArc> for ArcEventPayload {
    fn from(arc: &StoryArc) -> Self {
        Self {
            id: arc.id.clone(),
            title: arc.title.clone(),
            description: arc.description.clone(),
            status: arc.status,
            sort_order: arc.sort_order,
            color_hex: arc.color_hex.clone(),
            created_at: Some(arc.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentEventPayload {
    pub id: String,
    pub parent_id: String,
    pub parent_type: ParentType,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    #[serde(default)]
    pub url: Option<String>,
    pub upload_state: UploadState,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Attachment> for AttachmentEventPayload {
    fn from(attachment: &Attachment) -> Self {
        Self {
            id: attachment.id.clone(),
            parent_id: attachment.parent_id.clone(),
            parent_type: attachment.parent_type,
            filename: attachment.filename.clone(),
            mime_type: attachment.mime_type.clone(),
            size_bytes: attachment.size_bytes,
            url: attachment.remote_url.clone(),
            upload_state: attachment.upload_state,
            created_at: Some(attachment.created_at),
        }
    }
}

/// Soft-delete marker for `*.deleted` / `*.discarded`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDeletedPayload {
    pub id: String,
}

/// Target marker for status-change events (`*.activated`, `*.completed`, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStatusPayload {
    pub id: String,
}

/// Parallel-array reorder payload for `*.reordered`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderPayload {
    pub ids: Vec<String>,
    pub sort_orders: Vec<i32>,
}

impl ReorderPayload {
    /// Pairs of `(id, sort_order)`; trailing unmatched entries are dropped.
    pub fn pairs(&self) -> impl Iterator<Item = (&String, i32)> {
        self.ids.iter().zip(self.sort_orders.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackArcAssignmentPayload {
    pub stack_id: String,
    #[serde(default)]
    pub arc_id: Option<String>,
}

/// Device descriptor for `device.registered` / `device.updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEventPayload {
    pub id: String,
    pub device_key: String,
    pub name: String,
    pub platform: String,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub first_seen_at: Option<DateTime<Utc>>,
}

impl From<&Device> for DeviceEventPayload {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            device_key: device.device_key.clone(),
            name: device.name.clone(),
            platform: device.platform.clone(),
            os_version: device.os_version.clone(),
            app_version: device.app_version.clone(),
            first_seen_at: Some(device.first_seen_at),
        }
    }
}
