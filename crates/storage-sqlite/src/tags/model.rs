//! Database row for tags.

use crate::db::{format_opt_ts, format_ts, parse_opt_ts, parse_ts};
use crate::errors::StorageError;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use taskdeck_core::sync::SyncState;
use taskdeck_core::tags::{normalize_tag_name, Tag};

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
#[diesel(table_name = crate::schema::tags)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TagDB {
    pub id: String,
    pub name: String,
    /// Denormalized lowercase/trimmed name; indexed for the cross-device
    /// uniqueness lookup.
    pub normalized_name: String,
    pub color_hex: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: i32,
    pub sync_state: String,
    pub last_synced_at: Option<String>,
}

impl TagDB {
    pub fn from_domain(tag: &Tag) -> Self {
        Self {
            id: tag.id.clone(),
            name: tag.name.clone(),
            normalized_name: normalize_tag_name(&tag.name),
            color_hex: tag.color_hex.clone(),
            created_at: format_ts(tag.created_at),
            updated_at: format_ts(tag.updated_at),
            is_deleted: tag.is_deleted as i32,
            sync_state: tag.sync_state.as_str().to_string(),
            last_synced_at: format_opt_ts(tag.last_synced_at),
        }
    }

    pub fn to_domain(self) -> Result<Tag, StorageError> {
        Ok(Tag {
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            last_synced_at: parse_opt_ts(self.last_synced_at.as_deref())?,
            sync_state: SyncState::parse(&self.sync_state),
            id: self.id,
            name: self.name,
            color_hex: self.color_hex,
            is_deleted: self.is_deleted != 0,
        })
    }
}
