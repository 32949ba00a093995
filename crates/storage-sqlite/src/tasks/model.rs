//! Database row for queue tasks.

use crate::db::{enum_from_db, enum_to_db, format_opt_ts, format_ts, parse_opt_ts, parse_ts};
use crate::errors::StorageError;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use taskdeck_core::sync::SyncState;
use taskdeck_core::tasks::QueueTask;

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
#[diesel(table_name = crate::schema::queue_tasks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TaskDB {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: Option<i32>,
    pub sort_order: i32,
    pub last_active_time: Option<String>,
    pub stack_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: i32,
    pub sync_state: String,
    pub last_synced_at: Option<String>,
}

impl TaskDB {
    pub fn from_domain(task: &QueueTask) -> Result<Self, StorageError> {
        Ok(Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: enum_to_db(&task.status)?,
            priority: task.priority,
            sort_order: task.sort_order,
            last_active_time: format_opt_ts(task.last_active_time),
            stack_id: task.stack_id.clone(),
            created_at: format_ts(task.created_at),
            updated_at: format_ts(task.updated_at),
            is_deleted: task.is_deleted as i32,
            sync_state: task.sync_state.as_str().to_string(),
            last_synced_at: format_opt_ts(task.last_synced_at),
        })
    }

    pub fn to_domain(self) -> Result<QueueTask, StorageError> {
        Ok(QueueTask {
            status: enum_from_db(&self.status)?,
            last_active_time: parse_opt_ts(self.last_active_time.as_deref())?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            last_synced_at: parse_opt_ts(self.last_synced_at.as_deref())?,
            sync_state: SyncState::parse(&self.sync_state),
            id: self.id,
            title: self.title,
            description: self.description,
            priority: self.priority,
            sort_order: self.sort_order,
            stack_id: self.stack_id,
            is_deleted: self.is_deleted != 0,
        })
    }
}
