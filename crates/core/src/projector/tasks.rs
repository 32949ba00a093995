//! Task projection handlers.

use super::cache::EntityLookupCache;
use super::{ApplyOutcome, Projector};
use crate::conflicts::ConflictType;
use crate::errors::Result;
use crate::events::event_types;
use crate::events::{EntityDeletedPayload, EntityStatusPayload, RemoteEvent, ReorderPayload, TaskEventPayload};
use crate::sync::SyncState;
use crate::tasks::{QueueTask, TaskStatus};

const KIND: &str = "task";

impl Projector {
    pub(crate) fn lookup_task(
        &self,
        cache: &mut EntityLookupCache,
        id: &str,
    ) -> Result<Option<QueueTask>> {
        if let Some(task) = cache.tasks.get(id) {
            return Ok(Some(task.clone()));
        }
        let fetched = self.tasks.get_by_id(id)?;
        if let Some(ref task) = fetched {
            cache.tasks.insert(task.id.clone(), task.clone());
        }
        Ok(fetched)
    }

    pub(crate) async fn store_task(
        &self,
        cache: &mut EntityLookupCache,
        task: QueueTask,
    ) -> Result<()> {
        let saved = self.tasks.save(task, None).await?;
        cache.tasks.insert(saved.id.clone(), saved);
        Ok(())
    }

    pub(crate) async fn apply_task_upsert(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<TaskEventPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let now = self.clock.now();

        match self.lookup_task(cache, &payload.id)? {
            Some(current) => {
                if !self
                    .lww_gate(KIND, &current.id, current.updated_at, event, ConflictType::Update)
                    .await?
                {
                    return Ok(ApplyOutcome::kept_local(KIND, current.id));
                }
                let updated = QueueTask {
                    id: current.id.clone(),
                    title: payload.title,
                    description: payload.description,
                    status: payload.status,
                    priority: payload.priority,
                    sort_order: payload.sort_order,
                    last_active_time: payload.last_active_time,
                    stack_id: payload.stack_id,
                    created_at: current.created_at,
                    updated_at: event.timestamp,
                    is_deleted: current.is_deleted,
                    sync_state: SyncState::Synced,
                    last_synced_at: Some(now),
                };
                let id = updated.id.clone();
                self.store_task(cache, updated).await?;
                Ok(ApplyOutcome::applied(KIND, id))
            }
            None => {
                let task = QueueTask {
                    id: payload.id.clone(),
                    title: payload.title,
                    description: payload.description,
                    status: payload.status,
                    priority: payload.priority,
                    sort_order: payload.sort_order,
                    last_active_time: payload.last_active_time,
                    stack_id: payload.stack_id,
                    created_at: payload.created_at.unwrap_or(event.timestamp),
                    updated_at: event.timestamp,
                    is_deleted: false,
                    sync_state: SyncState::Synced,
                    last_synced_at: Some(now),
                };
                let id = task.id.clone();
                self.store_task(cache, task).await?;
                Ok(ApplyOutcome::applied(KIND, id))
            }
        }
    }

    pub(crate) async fn apply_task_deleted(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<EntityDeletedPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let Some(mut task) = self.lookup_task(cache, &payload.id)? else {
            self.breadcrumb_missing(KIND, &payload.id, event);
            return Ok(ApplyOutcome::skipped());
        };
        if !self
            .lww_gate(KIND, &task.id, task.updated_at, event, ConflictType::Delete)
            .await?
        {
            return Ok(ApplyOutcome::kept_local(KIND, task.id));
        }
        task.is_deleted = true;
        task.updated_at = event.timestamp;
        task.sync_state = SyncState::Synced;
        task.last_synced_at = Some(self.clock.now());
        let id = task.id.clone();
        self.store_task(cache, task).await?;
        Ok(ApplyOutcome::applied(KIND, id))
    }

    /// Task activation: the task moves to the front of its stack and the
    /// parent stack's `active_task_id` follows in the same application.
    pub(crate) async fn apply_task_activated(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<EntityStatusPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let Some(mut task) = self.lookup_task(cache, &payload.id)? else {
            self.breadcrumb_missing(KIND, &payload.id, event);
            return Ok(ApplyOutcome::skipped());
        };
        if !self
            .lww_gate(
                KIND,
                &task.id,
                task.updated_at,
                event,
                ConflictType::StatusChange,
            )
            .await?
        {
            return Ok(ApplyOutcome::kept_local(KIND, task.id));
        }

        task.status = TaskStatus::Pending;
        task.sort_order = 0;
        task.last_active_time = Some(event.timestamp);
        task.updated_at = event.timestamp;
        task.sync_state = SyncState::Synced;
        task.last_synced_at = Some(self.clock.now());
        let task_id = task.id.clone();
        let parent_id = task.stack_id.clone();
        self.store_task(cache, task).await?;

        if let Some(stack_id) = parent_id {
            if let Some(mut stack) = self.lookup_stack(cache, &stack_id)? {
                stack.active_task_id = Some(task_id.clone());
                stack.updated_at = event.timestamp;
                stack.sync_state = SyncState::Synced;
                stack.last_synced_at = Some(self.clock.now());
                self.store_stack(cache, stack).await?;
            } else {
                self.breadcrumb_missing("stack", &stack_id, event);
            }
        }
        Ok(ApplyOutcome::applied(KIND, task_id))
    }

    pub(crate) async fn apply_task_status(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<EntityStatusPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let Some(mut task) = self.lookup_task(cache, &payload.id)? else {
            self.breadcrumb_missing(KIND, &payload.id, event);
            return Ok(ApplyOutcome::skipped());
        };
        if !self
            .lww_gate(
                KIND,
                &task.id,
                task.updated_at,
                event,
                ConflictType::StatusChange,
            )
            .await?
        {
            return Ok(ApplyOutcome::kept_local(KIND, task.id));
        }
        task.status = match event.event_type.as_str() {
            event_types::TASK_COMPLETED => TaskStatus::Completed,
            _ => TaskStatus::Closed,
        };
        task.updated_at = event.timestamp;
        task.sync_state = SyncState::Synced;
        task.last_synced_at = Some(self.clock.now());
        let id = task.id.clone();
        self.store_task(cache, task).await?;
        Ok(ApplyOutcome::applied(KIND, id))
    }

    pub(crate) async fn apply_task_reorder(
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
            let Some(mut task) = self.lookup_task(cache, &id)? else {
                continue;
            };
            if !self
                .lww_gate(KIND, &task.id, task.updated_at, event, ConflictType::Reorder)
                .await?
            {
                continue;
            }
            task.sort_order = sort_order;
            task.updated_at = event.timestamp;
            task.sync_state = SyncState::Synced;
            task.last_synced_at = Some(self.clock.now());
            self.store_task(cache, task).await?;
            mutated = true;
        }
        if mutated {
            Ok(ApplyOutcome::applied_many(KIND))
        } else {
            Ok(ApplyOutcome::skipped())
        }
    }
}
