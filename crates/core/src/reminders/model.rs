//! Reminder domain models and repository contract.

use crate::errors::Result;
use crate::events::EventDraft;
use crate::sync::SyncState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of entity a reminder or attachment hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentType {
    Stack,
    Task,
    Arc,
}

impl ParentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParentType::Stack => "stack",
            ParentType::Task => "task",
            ParentType::Arc => "arc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Scheduled,
    Snoozed,
    Fired,
    Dismissed,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Scheduled => "scheduled",
            ReminderStatus::Snoozed => "snoozed",
            ReminderStatus::Fired => "fired",
            ReminderStatus::Dismissed => "dismissed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub parent_id: String,
    pub parent_type: ParentType,
    pub status: ReminderStatus,
    pub remind_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub sync_state: SyncState,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Storage contract for reminders.
#[async_trait]
pub trait ReminderRepositoryTrait: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Option<Reminder>>;
    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Reminder>>;
    fn list_for_parent(&self, parent_id: &str) -> Result<Vec<Reminder>>;
    async fn save(&self, reminder: Reminder, event: Option<EventDraft>) -> Result<Reminder>;
}
