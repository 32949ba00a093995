//! Projector: applies inbound events to local relational state under
//! per-entity last-writer-wins.

mod cache;
mod misc;
mod reconciler;
mod stacks;
mod tags;
mod tasks;

#[cfg(test)]
mod tests;

pub use reconciler::TagReconciler;

use crate::arcs::ArcRepositoryTrait;
use crate::attachments::AttachmentRepositoryTrait;
use crate::clock::SharedClock;
use crate::conflicts::{ConflictResolution, ConflictType, SyncConflict, SyncConflictRepositoryTrait};
use crate::devices::{DeviceRepositoryTrait, IdentityStore};
use crate::errors::Result;
use crate::events::{event_types, DomainEventSink, EventLog, RemoteEvent, CURRENT_PAYLOAD_VERSION};
use crate::reminders::ReminderRepositoryTrait;
use crate::stacks::StackRepositoryTrait;
use crate::sync::remote_wins;
use crate::tags::TagRepositoryTrait;
use crate::tasks::TaskRepositoryTrait;
use crate::telemetry::SharedTelemetry;
use async_trait::async_trait;
use cache::{EntityLookupCache, ReferencedIds};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// The transport hands inbound batches to this contract; `Projector` is the
/// only production implementation.
#[async_trait]
pub trait EventApplier: Send + Sync {
    /// Apply a batch, returning how many events mutated state. Individual
    /// bad events are skipped; storage failures abort the batch so the
    /// caller's checkpoint does not advance.
    async fn apply_batch(&self, events: Vec<RemoteEvent>) -> Result<usize>;
}

/// Outcome of projecting one event.
pub(crate) struct ApplyOutcome {
    pub mutated: bool,
    pub entity_id: Option<String>,
    pub kind: Option<&'static str>,
}

impl ApplyOutcome {
    fn skipped() -> Self {
        Self {
            mutated: false,
            entity_id: None,
            kind: None,
        }
    }

    fn kept_local(kind: &'static str, entity_id: String) -> Self {
        Self {
            mutated: false,
            entity_id: Some(entity_id),
            kind: Some(kind),
        }
    }

    fn applied(kind: &'static str, entity_id: String) -> Self {
        Self {
            mutated: true,
            entity_id: Some(entity_id),
            kind: Some(kind),
        }
    }

    /// Multi-target events (reorders) carry no single entity id.
    fn applied_many(kind: &'static str) -> Self {
        Self {
            mutated: true,
            entity_id: None,
            kind: Some(kind),
        }
    }
}

/// Single-writer projection component. All inbound events, whether pulled
/// over HTTP or streamed over the socket, funnel through `apply_batch`.
pub struct Projector {
    stacks: Arc<dyn StackRepositoryTrait>,
    tasks: Arc<dyn TaskRepositoryTrait>,
    reminders: Arc<dyn ReminderRepositoryTrait>,
    tags: Arc<dyn TagRepositoryTrait>,
    arcs: Arc<dyn ArcRepositoryTrait>,
    attachments: Arc<dyn AttachmentRepositoryTrait>,
    devices: Arc<dyn DeviceRepositoryTrait>,
    conflicts: Arc<dyn SyncConflictRepositoryTrait>,
    event_log: Arc<dyn EventLog>,
    identity: Arc<dyn IdentityStore>,
    reconciler: TagReconciler,
    clock: SharedClock,
    telemetry: SharedTelemetry,
    sink: Arc<dyn DomainEventSink>,
    // Batches from the pull path and the socket path serialize here; the
    // prefetch cache is only coherent for one batch at a time.
    batch_lock: tokio::sync::Mutex<()>,
}

/// Repository handles for constructing a projector.
pub struct ProjectorDeps {
    pub stacks: Arc<dyn StackRepositoryTrait>,
    pub tasks: Arc<dyn TaskRepositoryTrait>,
    pub reminders: Arc<dyn ReminderRepositoryTrait>,
    pub tags: Arc<dyn TagRepositoryTrait>,
    pub arcs: Arc<dyn ArcRepositoryTrait>,
    pub attachments: Arc<dyn AttachmentRepositoryTrait>,
    pub devices: Arc<dyn DeviceRepositoryTrait>,
    pub conflicts: Arc<dyn SyncConflictRepositoryTrait>,
    pub event_log: Arc<dyn EventLog>,
    pub identity: Arc<dyn IdentityStore>,
    pub clock: SharedClock,
    pub telemetry: SharedTelemetry,
    pub sink: Arc<dyn DomainEventSink>,
}

impl Projector {
    pub fn new(deps: ProjectorDeps) -> Self {
        Self {
            stacks: deps.stacks,
            tasks: deps.tasks,
            reminders: deps.reminders,
            tags: deps.tags,
            arcs: deps.arcs,
            attachments: deps.attachments,
            devices: deps.devices,
            conflicts: deps.conflicts,
            event_log: deps.event_log,
            identity: deps.identity,
            reconciler: TagReconciler::new(),
            clock: deps.clock,
            telemetry: deps.telemetry,
            sink: deps.sink,
            batch_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn prefetch(&self, events: &[RemoteEvent]) -> Result<EntityLookupCache> {
        let ids = ReferencedIds::collect(events);
        let mut cache = EntityLookupCache::default();

        let stack_ids: Vec<String> = ids.stacks.into_iter().collect();
        for stack in self.stacks.get_by_ids(&stack_ids)? {
            cache.stacks.insert(stack.id.clone(), stack);
        }
        let task_ids: Vec<String> = ids.tasks.into_iter().collect();
        for task in self.tasks.get_by_ids(&task_ids)? {
            cache.tasks.insert(task.id.clone(), task);
        }
        let reminder_ids: Vec<String> = ids.reminders.into_iter().collect();
        for reminder in self.reminders.get_by_ids(&reminder_ids)? {
            cache.reminders.insert(reminder.id.clone(), reminder);
        }
        let tag_ids: Vec<String> = ids.tags.into_iter().collect();
        for tag in self.tags.get_by_ids(&tag_ids)? {
            cache.tags.insert(tag.id.clone(), tag);
        }
        let arc_ids: Vec<String> = ids.arcs.into_iter().collect();
        for arc in self.arcs.get_by_ids(&arc_ids)? {
            cache.arcs.insert(arc.id.clone(), arc);
        }
        let attachment_ids: Vec<String> = ids.attachments.into_iter().collect();
        for attachment in self.attachments.get_by_ids(&attachment_ids)? {
            cache.attachments.insert(attachment.id.clone(), attachment);
        }
        for key in ids.device_keys {
            if let Some(device) = self.devices.get_by_device_key(&key)? {
                cache.devices_by_key.insert(key, device);
            }
        }
        Ok(cache)
    }

    async fn apply_one(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        use event_types::*;

        let outcome = match event.event_type.as_str() {
            STACK_CREATED | STACK_UPDATED => self.apply_stack_upsert(event, cache).await?,
            STACK_DELETED | STACK_DISCARDED => self.apply_stack_deleted(event, cache).await?,
            STACK_ACTIVATED | STACK_DEACTIVATED | STACK_COMPLETED | STACK_CLOSED
            | STACK_ARCHIVED => self.apply_stack_status(event, cache).await?,
            STACK_REORDERED => self.apply_stack_reorder(event, cache).await?,
            STACK_ARC_ASSIGNED => self.apply_stack_arc_assignment(event, cache).await?,

            TASK_CREATED | TASK_UPDATED => self.apply_task_upsert(event, cache).await?,
            TASK_DELETED => self.apply_task_deleted(event, cache).await?,
            TASK_ACTIVATED => self.apply_task_activated(event, cache).await?,
            TASK_COMPLETED | TASK_CLOSED => self.apply_task_status(event, cache).await?,
            TASK_REORDERED => self.apply_task_reorder(event, cache).await?,

            REMINDER_CREATED | REMINDER_UPDATED | REMINDER_SNOOZED | REMINDER_FIRED
            | REMINDER_DISMISSED => self.apply_reminder_upsert(event, cache).await?,
            REMINDER_DELETED => self.apply_reminder_deleted(event, cache).await?,

            TAG_CREATED => self.apply_tag_created(event, cache).await?,
            TAG_UPDATED => self.apply_tag_updated(event, cache).await?,
            TAG_DELETED => self.apply_tag_deleted(event, cache).await?,

            ARC_CREATED | ARC_UPDATED => self.apply_arc_upsert(event, cache).await?,
            ARC_DELETED => self.apply_arc_deleted(event, cache).await?,
            ARC_REORDERED => self.apply_arc_reorder(event, cache).await?,

            ATTACHMENT_CREATED | ATTACHMENT_UPDATED => {
                self.apply_attachment_upsert(event, cache).await?
            }
            ATTACHMENT_DELETED => self.apply_attachment_deleted(event, cache).await?,

            DEVICE_REGISTERED | DEVICE_UPDATED => self.apply_device_upsert(event, cache).await?,

            // Unknown types are ignored for forward compatibility.
            other => {
                self.telemetry.breadcrumb(
                    "projector",
                    "ignoring unknown event type",
                    serde_json::json!({ "type": other, "eventId": event.id }),
                );
                ApplyOutcome::skipped()
            }
        };
        Ok(outcome)
    }

    /// Decode a payload envelope; failures leave a breadcrumb and skip the
    /// event instead of aborting the batch.
    fn decode<T: DeserializeOwned>(&self, event: &RemoteEvent) -> Option<T> {
        match serde_json::from_value(event.payload.clone()) {
            Ok(value) => Some(value),
            Err(err) => {
                self.telemetry.breadcrumb(
                    "projector",
                    "payload decode failed",
                    serde_json::json!({
                        "eventId": event.id,
                        "type": event.event_type,
                        "error": err.to_string(),
                    }),
                );
                None
            }
        }
    }

    /// LWW gate: true when the event may mutate the entity. A rejection
    /// inserts a conflict row and keeps local state.
    async fn lww_gate(
        &self,
        entity_kind: &'static str,
        entity_id: &str,
        local_updated_at: DateTime<Utc>,
        event: &RemoteEvent,
        conflict_type: ConflictType,
    ) -> Result<bool> {
        if remote_wins(event.timestamp, local_updated_at) {
            return Ok(true);
        }
        self.conflicts
            .insert(SyncConflict {
                id: Uuid::new_v4().to_string(),
                entity_type: entity_kind.to_string(),
                entity_id: entity_id.to_string(),
                local_timestamp: local_updated_at,
                remote_timestamp: event.timestamp,
                conflict_type,
                resolution: ConflictResolution::KeptLocal,
                detected_at: self.clock.now(),
                is_resolved: true,
            })
            .await?;
        Ok(false)
    }

    fn breadcrumb_missing(&self, kind: &str, id: &str, event: &RemoteEvent) {
        self.telemetry.breadcrumb(
            "projector",
            "referenced entity not found",
            serde_json::json!({
                "kind": kind,
                "entityId": id,
                "eventId": event.id,
                "type": event.event_type,
            }),
        );
    }

    /// Advance `last_seen_at` for every device that authored events in this
    /// batch. One touch per device with the newest timestamp seen.
    async fn touch_devices(&self, events: &[RemoteEvent]) -> Result<()> {
        let mut newest: HashMap<&str, DateTime<Utc>> = HashMap::new();
        for event in events {
            let entry = newest
                .entry(event.device_id.as_str())
                .or_insert(event.timestamp);
            if event.timestamp > *entry {
                *entry = event.timestamp;
            }
        }
        for (device_key, seen_at) in newest {
            self.devices
                .touch_last_seen(device_key.to_string(), seen_at)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EventApplier for Projector {
    async fn apply_batch(&self, events: Vec<RemoteEvent>) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let _guard = self.batch_lock.lock().await;

        // Events within a batch apply in timestamp order; arrival order is
        // irrelevant under LWW but deterministic order keeps the conflict
        // log stable.
        let mut events = events;
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

        let mut cache = self.prefetch(&events)?;
        let mut applied = 0usize;
        let mut changed_kinds: Vec<&'static str> = Vec::new();

        for event in &events {
            if event.payload_version < CURRENT_PAYLOAD_VERSION {
                continue;
            }
            if self.event_log.exists(&event.id)? {
                continue;
            }

            let outcome = self.apply_one(event, &mut cache).await?;
            self.event_log
                .record_remote(event.clone(), outcome.entity_id.clone())
                .await?;

            if outcome.mutated {
                applied += 1;
                if let Some(kind) = outcome.kind {
                    if !changed_kinds.contains(&kind) {
                        changed_kinds.push(kind);
                    }
                }
            }
        }

        self.touch_devices(&events).await?;

        for kind in changed_kinds {
            self.sink.entities_changed(kind);
        }
        Ok(applied)
    }
}
