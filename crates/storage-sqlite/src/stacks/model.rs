//! Database row for stacks.

use crate::db::{enum_from_db, enum_to_db, format_opt_ts, format_ts, parse_opt_ts, parse_ts};
use crate::errors::StorageError;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use taskdeck_core::stacks::Stack;
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
#[diesel(table_name = crate::schema::stacks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StackDB {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: Option<i32>,
    pub sort_order: i32,
    pub is_draft: i32,
    pub is_active: i32,
    pub active_task_id: Option<String>,
    pub arc_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: i32,
    pub sync_state: String,
    pub last_synced_at: Option<String>,
}

impl StackDB {
    pub fn from_domain(stack: &Stack) -> Result<Self, StorageError> {
        Ok(Self {
            id: stack.id.clone(),
            title: stack.title.clone(),
            description: stack.description.clone(),
            status: enum_to_db(&stack.status)?,
            priority: stack.priority,
            sort_order: stack.sort_order,
            is_draft: stack.is_draft as i32,
            is_active: stack.is_active as i32,
            active_task_id: stack.active_task_id.clone(),
            arc_id: stack.arc_id.clone(),
            created_at: format_ts(stack.created_at),
            updated_at: format_ts(stack.updated_at),
            is_deleted: stack.is_deleted as i32,
            sync_state: stack.sync_state.as_str().to_string(),
            last_synced_at: format_opt_ts(stack.last_synced_at),
        })
    }

    pub fn to_domain(self, tag_ids: Vec<String>) -> Result<Stack, StorageError> {
        Ok(Stack {
            status: enum_from_db(&self.status)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            last_synced_at: parse_opt_ts(self.last_synced_at.as_deref())?,
            sync_state: SyncState::parse(&self.sync_state),
            id: self.id,
            title: self.title,
            description: self.description,
            priority: self.priority,
            sort_order: self.sort_order,
            is_draft: self.is_draft != 0,
            is_active: self.is_active != 0,
            active_task_id: self.active_task_id,
            arc_id: self.arc_id,
            tag_ids,
            is_deleted: self.is_deleted != 0,
        })
    }
}
