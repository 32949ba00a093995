//! Stack domain models and repository contract.

use crate::errors::Result;
use crate::events::EventDraft;
use crate::sync::SyncState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stack lifecycle status, orthogonal to the single-active indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    Active,
    Completed,
    Archived,
    Closed,
}

impl StackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackStatus::Active => "active",
            StackStatus::Completed => "completed",
            StackStatus::Archived => "archived",
            StackStatus::Closed => "closed",
        }
    }
}

/// A stack of queued tasks; the central entity of the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: StackStatus,
    pub priority: Option<i32>,
    pub sort_order: i32,
    pub is_draft: bool,
    /// Single-active indicator: at most one non-deleted stack per user has
    /// this set.
    pub is_active: bool,
    pub active_task_id: Option<String>,
    pub arc_id: Option<String>,
    pub tag_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub sync_state: SyncState,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Input for creating a stack.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStack {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<i32>,
    pub sort_order: Option<i32>,
    pub is_draft: bool,
    pub arc_id: Option<String>,
    pub tag_ids: Vec<String>,
}

/// Partial update for a stack; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Option<i32>>,
    pub sort_order: Option<i32>,
    pub is_draft: Option<bool>,
    pub arc_id: Option<Option<String>>,
    pub tag_ids: Option<Vec<String>>,
}

/// Storage contract for stacks.
///
/// `save` upserts the row (including the tag join set) and, when an event
/// draft is supplied, appends the event in the same transaction so a failed
/// append rolls the mutation back.
#[async_trait]
pub trait StackRepositoryTrait: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Option<Stack>>;
    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Stack>>;
    fn list(&self) -> Result<Vec<Stack>>;
    /// Non-deleted stacks with `is_active = true`. More than one result means
    /// invariant repair is due.
    fn list_active(&self) -> Result<Vec<Stack>>;
    async fn save(&self, stack: Stack, event: Option<EventDraft>) -> Result<Stack>;
    /// Upsert several stacks in one transaction (projector co-mutations).
    async fn save_batch(&self, stacks: Vec<Stack>) -> Result<()>;
    /// Write new sort orders, stamping `updated_at`, with one reorder event.
    async fn set_sort_orders(
        &self,
        orders: Vec<(String, i32)>,
        stamp: DateTime<Utc>,
        event: Option<EventDraft>,
    ) -> Result<()>;
    /// Point every stack referencing `from_tag_id` at `to_tag_id` instead and
    /// mark the touched rows sync-pending. Returns the migrated stack ids.
    async fn replace_tag_references(
        &self,
        from_tag_id: &str,
        to_tag_id: &str,
    ) -> Result<Vec<String>>;
}
