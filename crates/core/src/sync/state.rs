//! Per-entity sync state flag.

use serde::{Deserialize, Serialize};

/// Whether an entity's latest local state has been acknowledged by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Pending,
    Synced,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Pending => "pending",
            SyncState::Synced => "synced",
        }
    }

    pub fn parse(value: &str) -> SyncState {
        match value {
            "synced" => SyncState::Synced,
            _ => SyncState::Pending,
        }
    }
}
