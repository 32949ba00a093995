//! Database row for arcs.

use crate::db::{enum_from_db, enum_to_db, format_opt_ts, format_ts, parse_opt_ts, parse_ts};
use crate::errors::StorageError;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use taskdeck_core::arcs::StoryArc;
use taskdeck_core::sync::SyncState;

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
#[diesel(treat_none_as_null = true)]
#[diesel(table_name = crate::schema::arcs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ArcDB {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub sort_order: i32,
    pub color_hex: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: i32,
    pub sync_state: String,
    pub last_synced_at: Option<String>,
}

impl ArcDB {
    pub fn from_domain(arc: &StoryArc) -> Result<Self, StorageError> {
        Ok(Self {
            id: arc.id.clone(),
            title: arc.title.clone(),
            description: arc.description.clone(),
            status: enum_to_db(&arc.status)?,
            sort_order: arc.sort_order,
            color_hex: arc.color_hex.clone(),
            created_at: format_ts(arc.created_at),
            updated_at: format_ts(arc.updated_at),
            is_deleted: arc.is_deleted as i32,
            sync_state: arc.sync_state.as_str().to_string(),
            last_synced_at: format_opt_ts(arc.last_synced_at),
        })
    }

    pub fn to_domain(self) -> Result<StoryArc, StorageError> {
        Ok(StoryArc {
            status: enum_from_db(&self.status)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            last_synced_at: parse_opt_ts(self.last_synced_at.as_deref())?,
            sync_state: SyncState::parse(&self.sync_state),
            id: self.id,
            title: self.title,
            description: self.description,
            sort_order: self.sort_order,
            color_hex: self.color_hex,
            is_deleted: self.is_deleted != 0,
        })
    }
}
