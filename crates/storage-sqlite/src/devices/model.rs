//! Database row for devices.

use crate::db::{format_opt_ts, format_ts, parse_opt_ts, parse_ts};
use crate::errors::StorageError;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use taskdeck_core::devices::Device;
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
#[diesel(table_name = crate::schema::devices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DeviceDB {
    pub id: String,
    pub device_key: String,
    pub name: String,
    pub platform: String,
    pub os_version: Option<String>,
    pub app_version: Option<String>,
    pub first_seen_at: String,
    pub last_seen_at: String,
    pub is_current_device: i32,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: i32,
    pub sync_state: String,
    pub last_synced_at: Option<String>,
}

impl DeviceDB {
    pub fn from_domain(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            device_key: device.device_key.clone(),
            name: device.name.clone(),
            platform: device.platform.clone(),
            os_version: device.os_version.clone(),
            app_version: device.app_version.clone(),
            first_seen_at: format_ts(device.first_seen_at),
            last_seen_at: format_ts(device.last_seen_at),
            is_current_device: device.is_current_device as i32,
            created_at: format_ts(device.created_at),
            updated_at: format_ts(device.updated_at),
            is_deleted: device.is_deleted as i32,
            sync_state: device.sync_state.as_str().to_string(),
            last_synced_at: format_opt_ts(device.last_synced_at),
        }
    }

    pub fn to_domain(self) -> Result<Device, StorageError> {
        Ok(Device {
            first_seen_at: parse_ts(&self.first_seen_at)?,
            last_seen_at: parse_ts(&self.last_seen_at)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            last_synced_at: parse_opt_ts(self.last_synced_at.as_deref())?,
            sync_state: SyncState::parse(&self.sync_state),
            id: self.id,
            device_key: self.device_key,
            name: self.name,
            platform: self.platform,
            os_version: self.os_version,
            app_version: self.app_version,
            is_current_device: self.is_current_device != 0,
            is_deleted: self.is_deleted != 0,
        })
    }
}
