//! Queue task domain models and repository contract.

use crate::errors::Result;
use crate::events::EventDraft;
use crate::sync::SyncState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Closed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Closed => "closed",
        }
    }
}

/// A task queued inside a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueTask {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Option<i32>,
    pub sort_order: i32,
    /// Set when the task was last brought to the front of its stack.
    pub last_active_time: Option<DateTime<Utc>>,
    pub stack_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub sync_state: SyncState,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<i32>,
    pub sort_order: Option<i32>,
    pub stack_id: Option<String>,
}

/// Partial update for a task; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Option<i32>>,
    pub sort_order: Option<i32>,
    pub stack_id: Option<Option<String>>,
}

/// Storage contract for queue tasks.
#[async_trait]
pub trait TaskRepositoryTrait: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Option<QueueTask>>;
    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<QueueTask>>;
    fn list_for_stack(&self, stack_id: &str) -> Result<Vec<QueueTask>>;
    async fn save(&self, task: QueueTask, event: Option<EventDraft>) -> Result<QueueTask>;
    async fn set_sort_orders(
        &self,
        orders: Vec<(String, i32)>,
        stamp: DateTime<Utc>,
        event: Option<EventDraft>,
    ) -> Result<()>;
}
