//! Database row for reminders.

use crate::db::{enum_from_db, enum_to_db, format_opt_ts, format_ts, parse_opt_ts, parse_ts};
use crate::errors::StorageError;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use taskdeck_core::reminders::Reminder;
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
#[diesel(table_name = crate::schema::reminders)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ReminderDB {
    pub id: String,
    pub parent_id: String,
    pub parent_type: String,
    pub status: String,
    pub remind_at: String,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: i32,
    pub sync_state: String,
    pub last_synced_at: Option<String>,
}

impl ReminderDB {
    pub fn from_domain(reminder: &Reminder) -> Result<Self, StorageError> {
        Ok(Self {
            id: reminder.id.clone(),
            parent_id: reminder.parent_id.clone(),
            parent_type: enum_to_db(&reminder.parent_type)?,
            status: enum_to_db(&reminder.status)?,
            remind_at: format_ts(reminder.remind_at),
            created_at: format_ts(reminder.created_at),
            updated_at: format_ts(reminder.updated_at),
            is_deleted: reminder.is_deleted as i32,
            sync_state: reminder.sync_state.as_str().to_string(),
            last_synced_at: format_opt_ts(reminder.last_synced_at),
        })
    }

    pub fn to_domain(self) -> Result<Reminder, StorageError> {
        Ok(Reminder {
            parent_type: enum_from_db(&self.parent_type)?,
            status: enum_from_db(&self.status)?,
            remind_at: parse_ts(&self.remind_at)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            last_synced_at: parse_opt_ts(self.last_synced_at.as_deref())?,
            sync_state: SyncState::parse(&self.sync_state),
            id: self.id,
            parent_id: self.parent_id,
            is_deleted: self.is_deleted != 0,
        })
    }
}
