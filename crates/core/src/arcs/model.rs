//! Arc domain models and repository contract.

use crate::errors::Result;
use crate::events::EventDraft;
use crate::sync::SyncState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcStatus {
    Active,
    Completed,
    Archived,
}

impl ArcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArcStatus::Active => "active",
            ArcStatus::Completed => "completed",
            ArcStatus::Archived => "archived",
        }
    }
}

/// A long-lived grouping of stacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryArc {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: ArcStatus,
    pub sort_order: i32,
    pub color_hex: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub sync_state: SyncState,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Input for creating an arc.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArc {
    pub title: String,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub color_hex: Option<String>,
}

/// Storage contract for arcs.
#[async_trait]
pub trait ArcRepositoryTrait: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Option<StoryArc>>;
    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoryArc>>;
    fn list(&self) -> Result<Vec<StoryArc>>;
    async fn save(&self, arc: StoryArc, event: Option<EventDraft>) -> Result<StoryArc>;
    async fn set_sort_orders(
        &self,
        orders: Vec<(String, i32)>,
        stamp: DateTime<Utc>,
        event: Option<EventDraft>,
    ) -> Result<()>;
}
