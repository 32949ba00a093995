//! Reminder, arc, attachment, and device projection handlers.

use super::cache::EntityLookupCache;
use super::{ApplyOutcome, Projector};
use crate::arcs::StoryArc;
use crate::attachments::Attachment;
use crate::conflicts::ConflictType;
use crate::devices::Device;
use crate::errors::Result;
use crate::events::event_types;
use crate::events::{
    ArcEventPayload, AttachmentEventPayload, DeviceEventPayload, EntityDeletedPayload, RemoteEvent,
    ReminderEventPayload, ReorderPayload,
};
use crate::reminders::{ParentType, Reminder};
use crate::sync::SyncState;
use uuid::Uuid;

impl Projector {
    // ── Reminders ───────────────────────────────────────────────────────────

    fn parent_exists(
        &self,
        cache: &mut EntityLookupCache,
        parent_type: ParentType,
        parent_id: &str,
    ) -> Result<bool> {
        Ok(match parent_type {
            ParentType::Stack => self.lookup_stack(cache, parent_id)?.is_some(),
            ParentType::Task => self.lookup_task(cache, parent_id)?.is_some(),
            ParentType::Arc => self.lookup_arc(cache, parent_id)?.is_some(),
        })
    }

    /// Creates, updates, and status changes all carry the full reminder
    /// envelope (snooze moves `remind_at` along with the status).
    pub(crate) async fn apply_reminder_upsert(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<ReminderEventPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let conflict_type = if event.event_type == event_types::REMINDER_CREATED
            || event.event_type == event_types::REMINDER_UPDATED
        {
            ConflictType::Update
        } else {
            ConflictType::StatusChange
        };
        let now = self.clock.now();

        // The reminder row is inserted even when its parent is unknown: the
        // child holds the authoritative reference and the reverse collection
        // is derived, so nothing needs back-patching when the parent arrives.
        if !self.parent_exists(cache, payload.parent_type, &payload.parent_id)? {
            self.breadcrumb_missing(payload.parent_type.as_str(), &payload.parent_id, event);
        }

        let existing = match cache.reminders.get(&payload.id) {
            Some(reminder) => Some(reminder.clone()),
            None => {
                let fetched = self.reminders.get_by_id(&payload.id)?;
                if let Some(ref reminder) = fetched {
                    cache.reminders.insert(reminder.id.clone(), reminder.clone());
                }
                fetched
            }
        };

        let reminder = match existing {
            Some(current) => {
                if !self
                    .lww_gate("reminder", &current.id, current.updated_at, event, conflict_type)
                    .await?
                {
                    return Ok(ApplyOutcome::kept_local("reminder", current.id));
                }
                Reminder {
                    id: current.id.clone(),
                    parent_id: payload.parent_id,
                    parent_type: payload.parent_type,
                    status: payload.status,
                    remind_at: payload.remind_at,
                    created_at: current.created_at,
                    updated_at: event.timestamp,
                    is_deleted: current.is_deleted,
                    sync_state: SyncState::Synced,
                    last_synced_at: Some(now),
                }
            }
            None => Reminder {
                id: payload.id.clone(),
                parent_id: payload.parent_id,
                parent_type: payload.parent_type,
                status: payload.status,
                remind_at: payload.remind_at,
                created_at: payload.created_at.unwrap_or(event.timestamp),
                updated_at: event.timestamp,
                is_deleted: false,
                sync_state: SyncState::Synced,
                last_synced_at: Some(now),
            },
        };
        let id = reminder.id.clone();
        let saved = self.reminders.save(reminder, None).await?;
        cache.reminders.insert(saved.id.clone(), saved);
        Ok(ApplyOutcome::applied("reminder", id))
    }

    pub(crate) async fn apply_reminder_deleted(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<EntityDeletedPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let existing = match cache.reminders.get(&payload.id) {
            Some(reminder) => Some(reminder.clone()),
            None => self.reminders.get_by_id(&payload.id)?,
        };
        let Some(mut reminder) = existing else {
            self.breadcrumb_missing("reminder", &payload.id, event);
            return Ok(ApplyOutcome::skipped());
        };
        if !self
            .lww_gate(
                "reminder",
                &reminder.id,
                reminder.updated_at,
                event,
                ConflictType::Delete,
            )
            .await?
        {
            return Ok(ApplyOutcome::kept_local("reminder", reminder.id));
        }
        reminder.is_deleted = true;
        reminder.updated_at = event.timestamp;
        reminder.sync_state = SyncState::Synced;
        reminder.last_synced_at = Some(self.clock.now());
        let id = reminder.id.clone();
        let saved = self.reminders.save(reminder, None).await?;
        cache.reminders.insert(saved.id.clone(), saved);
        Ok(ApplyOutcome::applied("reminder", id))
    }

    // ── Arcs ────────────────────────────────────────────────────────────────

    pub(crate) fn lookup_arc(
        &self,
        cache: &mut EntityLookupCache,
        id: &str,
    ) -> Result<Option<StoryArc>> {
        if let Some(arc) = cache.arcs.get(id) {
            return Ok(Some(arc.clone()));
        }
        let fetched = self.arcs.get_by_id(id)?;
        if let Some(ref arc) = fetched {
            cache.arcs.insert(arc.id.clone(), arc.clone());
        }
        Ok(fetched)
    }

    pub(crate) async fn apply_arc_upsert(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<ArcEventPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let now = self.clock.now();
        let arc = match self.lookup_arc(cache, &payload.id)? {
            Some(current) => {
                if !self
                    .lww_gate("arc", &current.id, current.updated_at, event, ConflictType::Update)
                    .await?
                {
                    return Ok(ApplyOutcome::kept_local("arc", current.id));
                }
                StoryArc {
                    id: current.id.clone(),
                    title: payload.title,
                    description: payload.description,
                    status: payload.status,
                    sort_order: payload.sort_order,
                    color_hex: payload.color_hex,
                    created_at: current.created_at,
                    updated_at: event.timestamp,
                    is_deleted: current.is_deleted,
                    sync_state: SyncState::Synced,
                    last_synced_at: Some(now),
                }
            }
            None => StoryArc {
                id: payload.id.clone(),
                title: payload.title,
                description: payload.description,
                status: payload.status,
                sort_order: payload.sort_order,
                color_hex: payload.color_hex,
                created_at: payload.created_at.unwrap_or(event.timestamp),
                updated_at: event.timestamp,
                is_deleted: false,
                sync_state: SyncState::Synced,
                last_synced_at: Some(now),
            },
        };
        let id = arc.id.clone();
        let saved = self.arcs.save(arc, None).await?;
        cache.arcs.insert(saved.id.clone(), saved);
        Ok(ApplyOutcome::applied("arc", id))
    }

    pub(crate) async fn apply_arc_deleted(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<EntityDeletedPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let Some(mut arc) = self.lookup_arc(cache, &payload.id)? else {
            self.breadcrumb_missing("arc", &payload.id, event);
            return Ok(ApplyOutcome::skipped());
        };
        if !self
            .lww_gate("arc", &arc.id, arc.updated_at, event, ConflictType::Delete)
            .await?
        {
            return Ok(ApplyOutcome::kept_local("arc", arc.id));
        }
        arc.is_deleted = true;
        arc.updated_at = event.timestamp;
        arc.sync_state = SyncState::Synced;
        arc.last_synced_at = Some(self.clock.now());
        let id = arc.id.clone();
        let saved = self.arcs.save(arc, None).await?;
        cache.arcs.insert(saved.id.clone(), saved);
        Ok(ApplyOutcome::applied("arc", id))
    }

    pub(crate) async fn apply_arc_reorder(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<ReorderPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let mut mutated = false;
        let pairs: Vec<(String, i32)> = payload
            .pairs()
            .map(|(id, order)| (id.clone(), order))
            .collect();
        for (id, sort_order) in pairs {
            let Some(mut arc) = self.lookup_arc(cache, &id)? else {
                continue;
            };
            if !self
                .lww_gate("arc", &arc.id, arc.updated_at, event, ConflictType::Reorder)
                .await?
            {
                continue;
            }
            arc.sort_order = sort_order;
            arc.updated_at = event.timestamp;
            arc.sync_state = SyncState::Synced;
            arc.last_synced_at = Some(self.clock.now());
            let saved = self.arcs.save(arc, None).await?;
            cache.arcs.insert(saved.id.clone(), saved);
            mutated = true;
        }
        if mutated {
            Ok(ApplyOutcome::applied_many("arc"))
        } else {
            Ok(ApplyOutcome::skipped())
        }
    }

    // ── Attachments ─────────────────────────────────────────────────────────

    pub(crate) async fn apply_attachment_upsert(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<AttachmentEventPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let now = self.clock.now();
        let existing = match cache.attachments.get(&payload.id) {
            Some(attachment) => Some(attachment.clone()),
            None => self.attachments.get_by_id(&payload.id)?,
        };
        let attachment = match existing {
            Some(current) => {
                if !self
                    .lww_gate(
                        "attachment",
                        &current.id,
                        current.updated_at,
                        event,
                        ConflictType::Update,
                    )
                    .await?
                {
                    return Ok(ApplyOutcome::kept_local("attachment", current.id));
                }
                Attachment {
                    id: current.id.clone(),
                    parent_id: payload.parent_id,
                    parent_type: payload.parent_type,
                    filename: payload.filename,
                    mime_type: payload.mime_type,
                    size_bytes: payload.size_bytes,
                    remote_url: payload.url,
                    // The local blob path never replicates.
                    local_path: current.local_path.clone(),
                    upload_state: payload.upload_state,
                    created_at: current.created_at,
                    updated_at: event.timestamp,
                    is_deleted: current.is_deleted,
                    sync_state: SyncState::Synced,
                    last_synced_at: Some(now),
                }
            }
            None => Attachment {
                id: payload.id.clone(),
                parent_id: payload.parent_id,
                parent_type: payload.parent_type,
                filename: payload.filename,
                mime_type: payload.mime_type,
                size_bytes: payload.size_bytes,
                remote_url: payload.url,
                local_path: None,
                upload_state: payload.upload_state,
                created_at: payload.created_at.unwrap_or(event.timestamp),
                updated_at: event.timestamp,
                is_deleted: false,
                sync_state: SyncState::Synced,
                last_synced_at: Some(now),
            },
        };
        let id = attachment.id.clone();
        let saved = self.attachments.save(attachment, None).await?;
        cache.attachments.insert(saved.id.clone(), saved);
        Ok(ApplyOutcome::applied("attachment", id))
    }

    pub(crate) async fn apply_attachment_deleted(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<EntityDeletedPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let existing = match cache.attachments.get(&payload.id) {
            Some(attachment) => Some(attachment.clone()),
            None => self.attachments.get_by_id(&payload.id)?,
        };
        let Some(mut attachment) = existing else {
            self.breadcrumb_missing("attachment", &payload.id, event);
            return Ok(ApplyOutcome::skipped());
        };
        if !self
            .lww_gate(
                "attachment",
                &attachment.id,
                attachment.updated_at,
                event,
                ConflictType::Delete,
            )
            .await?
        {
            return Ok(ApplyOutcome::kept_local("attachment", attachment.id));
        }
        attachment.is_deleted = true;
        attachment.updated_at = event.timestamp;
        attachment.sync_state = SyncState::Synced;
        attachment.last_synced_at = Some(self.clock.now());
        let id = attachment.id.clone();
        let saved = self.attachments.save(attachment, None).await?;
        cache.attachments.insert(saved.id.clone(), saved);
        Ok(ApplyOutcome::applied("attachment", id))
    }

    // ── Devices ─────────────────────────────────────────────────────────────

    pub(crate) async fn apply_device_upsert(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<DeviceEventPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let now = self.clock.now();
        let is_current = self
            .identity
            .get()?
            .map(|identity| identity.device_id == payload.device_key)
            .unwrap_or(false);

        let existing = match cache.devices_by_key.get(&payload.device_key) {
            Some(device) => Some(device.clone()),
            None => self.devices.get_by_device_key(&payload.device_key)?,
        };
        let device = match existing {
            Some(current) => {
                if !self
                    .lww_gate(
                        "device",
                        &current.id,
                        current.updated_at,
                        event,
                        ConflictType::Update,
                    )
                    .await?
                {
                    return Ok(ApplyOutcome::kept_local("device", current.id));
                }
                Device {
                    id: current.id.clone(),
                    device_key: current.device_key.clone(),
                    name: payload.name,
                    platform: payload.platform,
                    os_version: payload.os_version,
                    app_version: payload.app_version,
                    first_seen_at: current.first_seen_at,
                    last_seen_at: current.last_seen_at.max(event.timestamp),
                    is_current_device: is_current || current.is_current_device,
                    created_at: current.created_at,
                    updated_at: event.timestamp,
                    is_deleted: current.is_deleted,
                    sync_state: SyncState::Synced,
                    last_synced_at: Some(now),
                }
            }
            None => Device {
                id: if payload.id.is_empty() {
                    Uuid::new_v4().to_string()
                } else {
                    payload.id.clone()
                },
                device_key: payload.device_key.clone(),
                name: payload.name,
                platform: payload.platform,
                os_version: payload.os_version,
                app_version: payload.app_version,
                first_seen_at: payload.first_seen_at.unwrap_or(event.timestamp),
                last_seen_at: event.timestamp,
                is_current_device: is_current,
                created_at: event.timestamp,
                updated_at: event.timestamp,
                is_deleted: false,
                sync_state: SyncState::Synced,
                last_synced_at: Some(now),
            },
        };
        let id = device.id.clone();
        let key = device.device_key.clone();
        let saved = self.devices.save(device, None).await?;
        cache.devices_by_key.insert(key, saved);
        Ok(ApplyOutcome::applied("device", id))
    }
}
