//! Device registry models and repository contract.

use crate::errors::Result;
use crate::events::EventDraft;
use crate::sync::SyncState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A device that has produced events for this user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    /// Stable hardware key; matches the `device_id` stamped on events.
    pub device_key: String,
    pub name: String,
    pub platform: String,
    pub os_version: Option<String>,
    pub app_version: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub is_current_device: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub sync_state: SyncState,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Descriptor for registering the current device.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub device_key: String,
    pub name: String,
    pub platform: String,
    pub os_version: Option<String>,
    pub app_version: Option<String>,
}

/// The identity stamped on every locally recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncIdentity {
    pub user_id: String,
    pub device_id: String,
    pub app_id: String,
}

/// Durable storage for the current device's sync identity. Event recording
/// fails until this has been initialized once.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    fn get(&self) -> Result<Option<SyncIdentity>>;
    async fn set(&self, identity: SyncIdentity) -> Result<()>;
}

/// Storage contract for the device registry.
#[async_trait]
pub trait DeviceRepositoryTrait: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Option<Device>>;
    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Device>>;
    fn get_by_device_key(&self, device_key: &str) -> Result<Option<Device>>;
    fn list(&self) -> Result<Vec<Device>>;
    async fn save(&self, device: Device, event: Option<EventDraft>) -> Result<Device>;
    /// Advance `last_seen_at` for the device with this key, if newer.
    async fn touch_last_seen(&self, device_key: String, seen_at: DateTime<Utc>) -> Result<()>;
}
