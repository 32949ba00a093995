//! Tag projection: LWW plus cross-device deduplication by normalized name.
//!
//! Two devices offline can each create Tag("Work") with distinct ids. On
//! `tag.created` the projector picks one canonical tag (the older
//! `created_at`, ties broken by the smaller id), migrates every stack
//! reference to it, tombstones the loser, and records a remapping so future
//! payloads naming the losing id still resolve.

use super::cache::EntityLookupCache;
use super::{ApplyOutcome, Projector};
use crate::conflicts::ConflictType;
use crate::errors::Result;
use crate::events::event_types;
use crate::events::{EntityDeletedPayload, EventDraft, RemoteEvent, StackEventPayload, TagEventPayload};
use crate::sync::SyncState;
use crate::tags::{canonical_order, normalize_tag_name, Tag};
use std::cmp::Ordering;

const KIND: &str = "tag";

impl Projector {
    pub(crate) fn lookup_tag(
        &self,
        cache: &mut EntityLookupCache,
        id: &str,
    ) -> Result<Option<Tag>> {
        if let Some(tag) = cache.tags.get(id) {
            return Ok(Some(tag.clone()));
        }
        let fetched = self.tags.get_by_id(id)?;
        if let Some(ref tag) = fetched {
            cache.tags.insert(tag.id.clone(), tag.clone());
        }
        Ok(fetched)
    }

    pub(crate) async fn store_tag(&self, cache: &mut EntityLookupCache, tag: Tag) -> Result<()> {
        let saved = self.tags.save(tag, None).await?;
        cache.tags.insert(saved.id.clone(), saved);
        Ok(())
    }

    pub(crate) async fn apply_tag_created(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<TagEventPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };

        // Known id: a replayed create is just an update under LWW.
        if let Some(current) = self.lookup_tag(cache, &payload.id)? {
            return self.update_existing_tag(current, payload, event, cache).await;
        }

        let normalized = normalize_tag_name(&payload.name);
        let local_twin = self.tags.find_by_normalized_name(&normalized)?;

        match local_twin {
            None => {
                let tag = self.tag_from_payload(&payload, event);
                let id = tag.id.clone();
                self.store_tag(cache, tag).await?;
                self.attach_pending_associations(cache, &id).await?;
                Ok(ApplyOutcome::applied(KIND, id))
            }
            Some(local) => {
                let incoming_created = payload.created_at.unwrap_or(event.timestamp);
                let incoming_is_canonical = canonical_order(
                    (&incoming_created, payload.id.as_str()),
                    (&local.created_at, local.id.as_str()),
                ) == Ordering::Less;

                if incoming_is_canonical {
                    self.merge_into_incoming(event, cache, payload, local).await
                } else {
                    // Local tag survives; the incoming duplicate is never
                    // inserted.
                    self.reconciler
                        .add_mapping(payload.id.clone(), local.id.clone())
                        .await;
                    self.drain_pending_onto(cache, &payload.id, &local.id).await?;
                    Ok(ApplyOutcome::kept_local(KIND, local.id))
                }
            }
        }
    }

    /// Incoming tag wins the canonical comparison: insert it, move every
    /// stack reference off the local twin, tombstone the twin, and remap.
    async fn merge_into_incoming(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
        payload: TagEventPayload,
        mut local: Tag,
    ) -> Result<ApplyOutcome> {
        let tag = self.tag_from_payload(&payload, event);
        let canonical_id = tag.id.clone();
        self.store_tag(cache, tag).await?;

        let migrated = self
            .stacks
            .replace_tag_references(&local.id, &canonical_id)
            .await?;

        local.is_deleted = true;
        // Stamp forward only; updated_at never moves backwards.
        local.updated_at = local.updated_at.max(event.timestamp);
        local.sync_state = SyncState::Synced;
        local.last_synced_at = Some(self.clock.now());
        let loser_id = local.id.clone();
        self.store_tag(cache, local).await?;

        self.reconciler
            .add_mapping(loser_id.clone(), canonical_id.clone())
            .await;

        self.drain_pending_onto(cache, &canonical_id, &canonical_id).await?;
        self.drain_pending_onto(cache, &loser_id, &canonical_id).await?;

        // Migrated stacks now carry a corrected tag set that the relay has
        // never seen; re-emit them so other devices converge.
        for stack_id in migrated {
            let Some(mut stack) = self.stacks.get_by_id(&stack_id)? else {
                continue;
            };
            stack.updated_at = self.clock.now();
            stack.sync_state = SyncState::Pending;
            let draft = EventDraft::new(
                event_types::STACK_UPDATED,
                Some(stack.id.clone()),
                &StackEventPayload::from(&stack),
            )?;
            let saved = self.stacks.save(stack, Some(draft)).await?;
            cache.stacks.insert(saved.id.clone(), saved);
        }

        Ok(ApplyOutcome::applied(KIND, canonical_id))
    }

    fn tag_from_payload(&self, payload: &TagEventPayload, event: &RemoteEvent) -> Tag {
        Tag {
            id: payload.id.clone(),
            name: payload.name.clone(),
            color_hex: payload.color_hex.clone(),
            created_at: payload.created_at.unwrap_or(event.timestamp),
            updated_at: event.timestamp,
            is_deleted: false,
            sync_state: SyncState::Synced,
            last_synced_at: Some(self.clock.now()),
        }
    }

    async fn update_existing_tag(
        &self,
        current: Tag,
        payload: TagEventPayload,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        if !self
            .lww_gate(KIND, &current.id, current.updated_at, event, ConflictType::Update)
            .await?
        {
            return Ok(ApplyOutcome::kept_local(KIND, current.id));
        }
        let updated = Tag {
            id: current.id.clone(),
            name: payload.name,
            color_hex: payload.color_hex,
            created_at: current.created_at,
            updated_at: event.timestamp,
            is_deleted: current.is_deleted,
            sync_state: SyncState::Synced,
            last_synced_at: Some(self.clock.now()),
        };
        let id = updated.id.clone();
        self.store_tag(cache, updated).await?;
        Ok(ApplyOutcome::applied(KIND, id))
    }

    /// Attach stacks parked on `tag_id` itself (no remapping involved).
    async fn attach_pending_associations(
        &self,
        cache: &mut EntityLookupCache,
        tag_id: &str,
    ) -> Result<()> {
        self.drain_pending_onto(cache, tag_id, tag_id).await
    }

    /// Drain the pending-association set for `pending_key`, attaching each
    /// parked stack to `canonical_id`.
    async fn drain_pending_onto(
        &self,
        cache: &mut EntityLookupCache,
        pending_key: &str,
        canonical_id: &str,
    ) -> Result<()> {
        let stack_ids = self.reconciler.take_pending(pending_key).await;
        for stack_id in stack_ids {
            let Some(mut stack) = self.lookup_stack(cache, &stack_id)? else {
                // The stack itself has not arrived yet; re-park the link.
                self.reconciler
                    .add_pending(pending_key.to_string(), stack_id)
                    .await;
                continue;
            };
            if stack.tag_ids.iter().any(|id| id == canonical_id) {
                continue;
            }
            stack.tag_ids.push(canonical_id.to_string());
            // Completing a link the stack's own event already described;
            // no timestamp stamp, no re-push.
            self.store_stack(cache, stack).await?;
        }
        Ok(())
    }

    pub(crate) async fn apply_tag_updated(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<TagEventPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let Some(current) = self.lookup_tag(cache, &payload.id)? else {
            self.breadcrumb_missing(KIND, &payload.id, event);
            return Ok(ApplyOutcome::skipped());
        };
        self.update_existing_tag(current, payload, event, cache).await
    }

    pub(crate) async fn apply_tag_deleted(
        &self,
        event: &RemoteEvent,
        cache: &mut EntityLookupCache,
    ) -> Result<ApplyOutcome> {
        let Some(payload) = self.decode::<EntityDeletedPayload>(event) else {
            return Ok(ApplyOutcome::skipped());
        };
        let Some(mut tag) = self.lookup_tag(cache, &payload.id)? else {
            self.breadcrumb_missing(KIND, &payload.id, event);
            return Ok(ApplyOutcome::skipped());
        };
        if !self
            .lww_gate(KIND, &tag.id, tag.updated_at, event, ConflictType::Delete)
            .await?
        {
            return Ok(ApplyOutcome::kept_local(KIND, tag.id));
        }
        tag.is_deleted = true;
        tag.updated_at = event.timestamp;
        tag.sync_state = SyncState::Synced;
        tag.last_synced_at = Some(self.clock.now());
        let id = tag.id.clone();
        self.store_tag(cache, tag).await?;
        Ok(ApplyOutcome::applied(KIND, id))
    }
}
