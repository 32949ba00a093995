//! Database rows for the event log and device identity.

use crate::db::{format_opt_ts, format_ts, parse_opt_ts, parse_ts};
use crate::errors::StorageError;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use taskdeck_core::events::{Event, EventSyncStatus};

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
#[diesel(table_name = crate::schema::events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EventDB {
    pub id: String,
    pub event_type: String,
    pub payload: String,
    pub ts: String,
    pub entity_id: Option<String>,
    pub user_id: String,
    pub device_id: String,
    pub app_id: String,
    pub payload_version: i32,
    pub is_synced: i32,
    pub synced_at: Option<String>,
    pub status: String,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: String,
}

impl EventDB {
    pub fn from_domain(event: &Event) -> Result<Self, StorageError> {
        Ok(Self {
            id: event.id.clone(),
            event_type: event.event_type.clone(),
            payload: serde_json::to_string(&event.payload)
                .map_err(|e| StorageError::CorruptRow(format!("Unserializable payload: {}", e)))?,
            ts: format_ts(event.timestamp),
            entity_id: event.entity_id.clone(),
            user_id: event.user_id.clone(),
            device_id: event.device_id.clone(),
            app_id: event.app_id.clone(),
            payload_version: event.payload_version,
            is_synced: event.is_synced as i32,
            synced_at: format_opt_ts(event.synced_at),
            status: event.status.as_str().to_string(),
            retry_count: event.retry_count,
            last_error: event.last_error.clone(),
            created_at: format_ts(event.created_at),
        })
    }

    pub fn to_domain(self) -> Result<Event, StorageError> {
        Ok(Event {
            payload: serde_json::from_str(&self.payload)
                .map_err(|e| StorageError::CorruptRow(format!("Bad payload JSON: {}", e)))?,
            timestamp: parse_ts(&self.ts)?,
            synced_at: parse_opt_ts(self.synced_at.as_deref())?,
            created_at: parse_ts(&self.created_at)?,
            id: self.id,
            event_type: self.event_type,
            entity_id: self.entity_id,
            user_id: self.user_id,
            device_id: self.device_id,
            app_id: self.app_id,
            payload_version: self.payload_version,
            is_synced: self.is_synced != 0,
            status: EventSyncStatus::parse(&self.status),
            retry_count: self.retry_count,
            last_error: self.last_error,
        })
    }
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
#[diesel(table_name = crate::schema::device_identity)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DeviceIdentityDB {
    pub id: i32,
    pub user_id: String,
    pub device_id: String,
    pub app_id: String,
    pub updated_at: String,
}
