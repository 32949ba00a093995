//! Tag service. Local creation already dedups by normalized name so a single
//! device never produces two live tags called "Work" and "work"; the
//! cross-device case is the projector's job.

use super::{normalize_tag_name, Tag, TagRepositoryTrait};
use crate::clock::SharedClock;
use crate::errors::{Error, Result};
use crate::events::event_types;
use crate::events::{EntityDeletedPayload, EventDraft, TagEventPayload};
use crate::sync::{PushNudge, SyncState};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait TagServiceTrait: Send + Sync {
    fn get_tag(&self, id: &str) -> Result<Option<Tag>>;
    fn list_tags(&self) -> Result<Vec<Tag>>;
    /// Returns the existing live tag when the normalized name is already
    /// taken; otherwise inserts and emits `tag.created`.
    async fn create_tag(&self, name: String, color_hex: Option<String>) -> Result<Tag>;
    async fn update_tag(
        &self,
        id: &str,
        name: Option<String>,
        color_hex: Option<Option<String>>,
    ) -> Result<Tag>;
    async fn delete_tag(&self, id: &str) -> Result<()>;
}

pub struct TagService {
    repository: Arc<dyn TagRepositoryTrait>,
    clock: SharedClock,
    nudge: PushNudge,
}

impl TagService {
    pub fn new(
        repository: Arc<dyn TagRepositoryTrait>,
        clock: SharedClock,
        nudge: PushNudge,
    ) -> Self {
        Self {
            repository,
            clock,
            nudge,
        }
    }
}

#[async_trait]
impl TagServiceTrait for TagService {
    fn get_tag(&self, id: &str) -> Result<Option<Tag>> {
        self.repository.get_by_id(id)
    }

    fn list_tags(&self) -> Result<Vec<Tag>> {
        self.repository.list()
    }

    async fn create_tag(&self, name: String, color_hex: Option<String>) -> Result<Tag> {
        let trimmed = name.trim().to_string();
        if trimmed.is_empty() {
            return Err(Error::validation("Tag name must not be empty"));
        }
        let normalized = normalize_tag_name(&trimmed);
        if let Some(existing) = self.repository.find_by_normalized_name(&normalized)? {
            return Ok(existing);
        }

        let now = self.clock.now();
        let tag = Tag {
            id: Uuid::new_v4().to_string(),
            name: trimmed,
            color_hex,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            sync_state: SyncState::Pending,
            last_synced_at: None,
        };
        let draft = EventDraft::new(
            event_types::TAG_CREATED,
            Some(tag.id.clone()),
            &TagEventPayload::from(&tag),
        )?;
        let saved = self.repository.save(tag, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }

    async fn update_tag(
        &self,
        id: &str,
        name: Option<String>,
        color_hex: Option<Option<String>>,
    ) -> Result<Tag> {
        let mut tag = self
            .repository
            .get_by_id(id)?
            .ok_or_else(|| Error::NotFound("Tag", id.to_string()))?;
        if let Some(name) = name {
            let trimmed = name.trim().to_string();
            if trimmed.is_empty() {
                return Err(Error::validation("Tag name must not be empty"));
            }
            tag.name = trimmed;
        }
        if let Some(color_hex) = color_hex {
            tag.color_hex = color_hex;
        }
        tag.updated_at = self.clock.now();
        tag.sync_state = SyncState::Pending;

        let draft = EventDraft::new(
            event_types::TAG_UPDATED,
            Some(tag.id.clone()),
            &TagEventPayload::from(&tag),
        )?;
        let saved = self.repository.save(tag, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }

    async fn delete_tag(&self, id: &str) -> Result<()> {
        let mut tag = self
            .repository
            .get_by_id(id)?
            .ok_or_else(|| Error::NotFound("Tag", id.to_string()))?;
        tag.is_deleted = true;
        tag.updated_at = self.clock.now();
        tag.sync_state = SyncState::Pending;

        let draft = EventDraft::new(
            event_types::TAG_DELETED,
            Some(tag.id.clone()),
            &EntityDeletedPayload { id: tag.id.clone() },
        )?;
        self.repository.save(tag, Some(draft)).await?;
        self.nudge.push();
        Ok(())
    }
}
