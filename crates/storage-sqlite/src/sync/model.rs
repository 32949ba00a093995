//! Database rows for sync bookkeeping.

use crate::db::{enum_from_db, enum_to_db, format_ts, parse_ts};
use crate::errors::StorageError;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use taskdeck_core::conflicts::SyncConflict;

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::sync_checkpoint)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncCheckpointDB {
    pub id: i32,
    pub checkpoint: String,
    pub updated_at: String,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::sync_conflicts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncConflictDB {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub local_timestamp: String,
    pub remote_timestamp: String,
    pub conflict_type: String,
    pub resolution: String,
    pub detected_at: String,
    pub is_resolved: i32,
}

impl SyncConflictDB {
    pub fn from_domain(conflict: &SyncConflict) -> Result<Self, StorageError> {
        Ok(Self {
            id: conflict.id.clone(),
            entity_type: conflict.entity_type.clone(),
            entity_id: conflict.entity_id.clone(),
            local_timestamp: format_ts(conflict.local_timestamp),
            remote_timestamp: format_ts(conflict.remote_timestamp),
            conflict_type: enum_to_db(&conflict.conflict_type)?,
            resolution: enum_to_db(&conflict.resolution)?,
            detected_at: format_ts(conflict.detected_at),
            is_resolved: conflict.is_resolved as i32,
        })
    }

    pub fn to_domain(self) -> Result<SyncConflict, StorageError> {
        Ok(SyncConflict {
            local_timestamp: parse_ts(&self.local_timestamp)?,
            remote_timestamp: parse_ts(&self.remote_timestamp)?,
            detected_at: parse_ts(&self.detected_at)?,
            conflict_type: enum_from_db(&self.conflict_type)?,
            resolution: enum_from_db(&self.resolution)?,
            id: self.id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            is_resolved: self.is_resolved != 0,
        })
    }
}
