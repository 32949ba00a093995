//! Sync conflict models and repository contract.

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of mutation lost the LWW comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictType {
    Update,
    Delete,
    StatusChange,
    Reorder,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::Update => "update",
            ConflictType::Delete => "delete",
            ConflictType::StatusChange => "statusChange",
            ConflictType::Reorder => "reorder",
        }
    }
}

/// How the conflict was resolved. Auto-resolution always keeps local state;
/// the variant exists so the row shape survives a future richer policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictResolution {
    KeptLocal,
}

impl ConflictResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::KeptLocal => "keptLocal",
        }
    }
}

/// One LWW rejection. Observational only: conflicts are recorded for
/// debugging and support, never replayed into state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub local_timestamp: DateTime<Utc>,
    pub remote_timestamp: DateTime<Utc>,
    pub conflict_type: ConflictType,
    pub resolution: ConflictResolution,
    pub detected_at: DateTime<Utc>,
    pub is_resolved: bool,
}

/// Storage contract for the conflict log.
#[async_trait]
pub trait SyncConflictRepositoryTrait: Send + Sync {
    async fn insert(&self, conflict: SyncConflict) -> Result<()>;
    fn list(&self) -> Result<Vec<SyncConflict>>;
    fn list_for_entity(&self, entity_id: &str) -> Result<Vec<SyncConflict>>;
}
