//! Device registry service and identity bootstrap.

use super::{Device, DeviceDescriptor, DeviceRepositoryTrait, IdentityStore, SyncIdentity};
use crate::clock::SharedClock;
use crate::errors::{Error, Result};
use crate::events::event_types;
use crate::events::{DeviceEventPayload, EventDraft};
use crate::sync::{PushNudge, SyncState};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait DeviceServiceTrait: Send + Sync {
    fn list_devices(&self) -> Result<Vec<Device>>;
    fn current_identity(&self) -> Result<Option<SyncIdentity>>;
    /// Initialize the sync identity and upsert this device's registry row.
    /// Must run once before any event can be recorded; safe to repeat on
    /// every launch (it refreshes the descriptor and `last_seen_at`).
    async fn register_current(
        &self,
        user_id: String,
        app_id: String,
        descriptor: DeviceDescriptor,
    ) -> Result<Device>;
}

pub struct DeviceService {
    repository: Arc<dyn DeviceRepositoryTrait>,
    identity: Arc<dyn IdentityStore>,
    clock: SharedClock,
    nudge: PushNudge,
}

impl DeviceService {
    pub fn new(
        repository: Arc<dyn DeviceRepositoryTrait>,
        identity: Arc<dyn IdentityStore>,
        clock: SharedClock,
        nudge: PushNudge,
    ) -> Self {
        Self {
            repository,
            identity,
            clock,
            nudge,
        }
    }
}

#[async_trait]
impl DeviceServiceTrait for DeviceService {
    fn list_devices(&self) -> Result<Vec<Device>> {
        self.repository.list()
    }

    fn current_identity(&self) -> Result<Option<SyncIdentity>> {
        self.identity.get()
    }

    async fn register_current(
        &self,
        user_id: String,
        app_id: String,
        descriptor: DeviceDescriptor,
    ) -> Result<Device> {
        if descriptor.device_key.trim().is_empty() {
            return Err(Error::validation("Device key must not be empty"));
        }
        let now = self.clock.now();

        // Identity first: the device.registered event below needs it.
        self.identity
            .set(SyncIdentity {
                user_id,
                device_id: descriptor.device_key.clone(),
                app_id,
            })
            .await?;

        let existing = self.repository.get_by_device_key(&descriptor.device_key)?;
        let is_new = existing.is_none();
        let device = match existing {
            Some(mut device) => {
                device.name = descriptor.name;
                device.platform = descriptor.platform;
                device.os_version = descriptor.os_version;
                device.app_version = descriptor.app_version;
                device.last_seen_at = now;
                device.is_current_device = true;
                device.updated_at = now;
                device.sync_state = SyncState::Pending;
                device
            }
            None => Device {
                id: Uuid::new_v4().to_string(),
                device_key: descriptor.device_key,
                name: descriptor.name,
                platform: descriptor.platform,
                os_version: descriptor.os_version,
                app_version: descriptor.app_version,
                first_seen_at: now,
                last_seen_at: now,
                is_current_device: true,
                created_at: now,
                updated_at: now,
                is_deleted: false,
                sync_state: SyncState::Pending,
                last_synced_at: None,
            },
        };

        let event_type = if is_new {
            event_types::DEVICE_REGISTERED
        } else {
            event_types::DEVICE_UPDATED
        };
        let draft = EventDraft::new(
            event_type,
            Some(device.id.clone()),
            &DeviceEventPayload::from(&device),
        )?;
        let saved = self.repository.save(device, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }
}
