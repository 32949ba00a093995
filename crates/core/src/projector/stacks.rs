//! Stack projection handlers.

use super::cache::EntityLookupCache;
use super::{ApplyOutcome, Projector};
use crate::conflicts::ConflictType;
use crate::errors::Result;
use crate::events::event_types;
use crate::events::{
    EntityDeletedPayload, EntityStatusPayload, RemoteEvent, ReorderPayload,
    StackArcAssignmentPayload, StackEventPayload,
};
use crate::stacks::{Stack, StackStatus};
use crate::sync::SyncState;

const KIND: &str = "stack";

impl Projector {
    pub(crate) fn lookup_stack(
        &self,
        cache: &mut EntityLookupCache,
        id: &str,
    ) -> Result<Option<Stack>> {
        if let Some(stack) = cache.stacks.get(id) {
            return Ok(Some(stack.clone()));
        }
        let fetched = self.stacks.get_by_id(id)?;
        if let Some(ref stack) = fetched {
            cache.stacks.insert(stack.id.clone(), stack.clone());
        }
        Ok(fetched)
    }

    pub(crate) async fn store_stack(
        &self,
        cache: &mut EntityLookupCache,
        stack: Stack,
    ) -> Result<()> {
        let saved = self.stacks.save(stack, None).await?;
        cache.stacks.insert(saved.id.clone(), saved);
        Ok(())
    }

    /// Resolve a payload's tag list: remap duplicate ids, keep the tags that
    /// exist locally, and park the rest as pending associations.
    pub(crate) async fn resolve_tag_references(
        &self,
        cache: &mut EntityLookupCache,
        stack_id: &str,
        tag_ids: &[String],
    ) -> Result<Vec<String>> {
        let mut resolved = Vec::with_capacity(tag_ids.len());
        for raw_id in tag_ids {
            let tag_id = self.reconciler.resolve_id(raw_id).await;
            let known = match cache.tags.get(&tag_id) {
                Some(tag) => !tag.is_deleted,
                None => match self.tags.get_by_id(&tag_id)? {
                    Some(tag) => {
                        let live = !tag.is_deleted;
                        cache.tags.insert(tag.id.clone(), tag);
                        live
                    }
                    None => false,
                },
            };
            if known {
                if !resolved.contains(&tag_id) {
                    resolved.push(tag_id);
                }
            } else {
                self.reconciler
                    .add_pending(tag_id, stack_id.to_string())
                    .await;
            }
        }
        Ok(resolved)
    }

    pub(crate) async fn apply_stack_upsert(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<StackEventPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let now = self.clock.now();

        match self.lookup_stack(cache, &payload.id)? {
            Some(current) => {
                if !self
                    .lww_gate(KIND, &current.id, current.updated_at, event, ConflictType::Update)
                    .await?
                {
                    // Losing events park nothing; their tag list is stale.
                    return Ok(ApplyOutcome::kept_local(KIND, current.id));
                }
                let tag_ids = self
                    .resolve_tag_references(cache, &payload.id, &payload.tag_ids)
                    .await?;
                let updated = Stack {
                    id: current.id.clone(),
                    title: payload.title,
                    description: payload.description,
                    status: payload.status,
                    priority: payload.priority,
                    sort_order: payload.sort_order,
                    is_draft: payload.is_draft,
                    // Tombstones are never unset by updates.
                    is_active: payload.is_active && !current.is_deleted,
                    active_task_id: payload.active_task_id,
                    arc_id: payload.arc_id,
                    tag_ids,
                    created_at: current.created_at,
                    updated_at: event.timestamp,
                    is_deleted: current.is_deleted,
                    sync_state: SyncState::Synced,
                    last_synced_at: Some(now),
                };
                let id = updated.id.clone();
                self.store_stack(cache, updated).await?;
                Ok(ApplyOutcome::applied(KIND, id))
            }
            None => {
                let tag_ids = self
                    .resolve_tag_references(cache, &payload.id, &payload.tag_ids)
                    .await?;
                let stack = Stack {
                    id: payload.id.clone(),
                    title: payload.title,
                    description: payload.description,
                    status: payload.status,
                    priority: payload.priority,
                    sort_order: payload.sort_order,
                    is_draft: payload.is_draft,
                    is_active: payload.is_active,
                    active_task_id: payload.active_task_id,
                    arc_id: payload.arc_id,
                    tag_ids,
                    created_at: payload.created_at.unwrap_or(event.timestamp),
                    updated_at: event.timestamp,
                    is_deleted: false,
                    sync_state: SyncState::Synced,
                    last_synced_at: Some(now),
                };
                let id = stack.id.clone();
                self.store_stack(cache, stack).await?;
                Ok(ApplyOutcome::applied(KIND, id))
            }
        }
    }

    pub(crate) async fn apply_stack_deleted(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<EntityDeletedPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let Some(mut stack) = self.lookup_stack(cache, &payload.id)? else {
            self.breadcrumb_missing(KIND, &payload.id, event);
            return Ok(ApplyOutcome::skipped());
        };
        if !self
            .lww_gate(KIND, &stack.id, stack.updated_at, event, ConflictType::Delete)
            .await?
        {
            return Ok(ApplyOutcome::kept_local(KIND, stack.id));
        }
        stack.is_deleted = true;
        // Deleted stacks cannot hold the single-active flag.
        stack.is_active = false;
        stack.updated_at = event.timestamp;
        stack.sync_state = SyncState::Synced;
        stack.last_synced_at = Some(self.clock.now());
        let id = stack.id.clone();
        self.store_stack(cache, stack).await?;
        Ok(ApplyOutcome::applied(KIND, id))
    }

    pub(crate) async fn apply_stack_status(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<EntityStatusPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let Some(mut stack) = self.lookup_stack(cache, &payload.id)? else {
            self.breadcrumb_missing(KIND, &payload.id, event);
            return Ok(ApplyOutcome::skipped());
        };
        if !self
            .lww_gate(
                KIND,
                &stack.id,
                stack.updated_at,
                event,
                ConflictType::StatusChange,
            )
            .await?
        {
            return Ok(ApplyOutcome::kept_local(KIND, stack.id));
        }

        match event.event_type.as_str() {
            event_types::STACK_ACTIVATED => {
                if stack.is_deleted {
                    // A tombstone never becomes the active stack.
                    return Ok(ApplyOutcome::kept_local(KIND, stack.id));
                }
                self.deactivate_other_stacks(event, cache, &stack.id).await?;
                stack.is_active = true;
                stack.status = StackStatus::Active;
            }
            event_types::STACK_DEACTIVATED => {
                stack.is_active = false;
            }
            event_types::STACK_COMPLETED => {
                stack.status = StackStatus::Completed;
                stack.is_active = false;
            }
            event_types::STACK_CLOSED => {
                stack.status = StackStatus::Closed;
                stack.is_active = false;
            }
            event_types::STACK_ARCHIVED => {
                stack.status = StackStatus::Archived;
                stack.is_active = false;
            }
            _ => unreachable!("dispatch guarantees a stack status event"),
        }
        stack.updated_at = event.timestamp;
        stack.sync_state = SyncState::Synced;
        stack.last_synced_at = Some(self.clock.now());
        let id = stack.id.clone();
        self.store_stack(cache, stack).await?;
        Ok(ApplyOutcome::applied(KIND, id))
    }

    /// Single-active enforcement: every other active stack is deactivated,
    /// stamped with the event's timestamp so all devices converge on the
    /// implicit deactivation.
    async fn deactivate_other_stacks(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
        winner_id: &str,
    ) -> Result<()> {
        let mut candidates = self.stacks.list_active()?;
        // The cache may hold batch-local activations the store already knows
        // nothing newer about; overlay it.
        for stack in cache.stacks.values() {
            if stack.is_active && !candidates.iter().any(|c| c.id == stack.id) {
                candidates.push(stack.clone());
            }
        }
        for mut other in candidates {
            if other.id == winner_id || !other.is_active {
                continue;
            }
            // Refresh from cache in case an earlier event in this batch
            // already rewrote the row.
            if let Some(cached) = cache.stacks.get(&other.id) {
                other = cached.clone();
                if !other.is_active {
                    continue;
                }
            }
            other.is_active = false;
            other.updated_at = event.timestamp;
            other.sync_state = SyncState::Synced;
            other.last_synced_at = Some(self.clock.now());
            self.store_stack(cache, other).await?;
        }
        Ok(())
    }

    pub(crate) async fn apply_stack_reorder(
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
            // Missing entities are skipped; they may arrive in a later page.
            let Some(mut stack) = self.lookup_stack(cache, &id)? else {
                continue;
            };
            if !self
                .lww_gate(KIND, &stack.id, stack.updated_at, event, ConflictType::Reorder)
                .await?
            {
                continue;
            }
            stack.sort_order = sort_order;
            stack.updated_at = event.timestamp;
            stack.sync_state = SyncState::Synced;
            stack.last_synced_at = Some(self.clock.now());
            self.store_stack(cache, stack).await?;
            mutated = true;
        }
        if mutated {
            Ok(ApplyOutcome::applied_many(KIND))
        } else {
            Ok(ApplyOutcome::skipped())
        }
    }

    pub(crate) async fn apply_stack_arc_assignment(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<StackArcAssignmentPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let Some(mut stack) = self.lookup_stack(cache, &payload.stack_id)? else {
            self.breadcrumb_missing(KIND, &payload.stack_id, event);
            return Ok(ApplyOutcome::skipped());
        };
        if !self
            .lww_gate(KIND, &stack.id, stack.updated_at, event, ConflictType::Update)
            .await?
        {
            return Ok(ApplyOutcome::kept_local(KIND, stack.id));
        }
        stack.arc_id = payload.arc_id;
        stack.updated_at = event.timestamp;
        stack.sync_state = SyncState::Synced;
        stack.last_synced_at = Some(self.clock.now());
        let id = stack.id.clone();
        self.store_stack(cache, stack).await?;
        Ok(ApplyOutcome::applied(KIND, id))
    }
}
