//! Arc service.

use super::{ArcRepositoryTrait, ArcStatus, NewArc, StoryArc};
use crate::clock::SharedClock;
use crate::errors::{Error, Result};
use crate::events::event_types;
use crate::events::{ArcEventPayload, EntityDeletedPayload, EventDraft, ReorderPayload};
use crate::sync::{PushNudge, SyncState};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait ArcServiceTrait: Send + Sync {
    fn get_arc(&self, id: &str) -> Result<Option<StoryArc>>;
    fn list_arcs(&self) -> Result<Vec<StoryArc>>;
    async fn create_arc(&self, input: NewArc) -> Result<StoryArc>;
    async fn update_arc(&self, arc: StoryArc) -> Result<StoryArc>;
    async fn delete_arc(&self, id: &str) -> Result<()>;
    async fn reorder_arcs(&self, ids: Vec<String>, sort_orders: Vec<i32>) -> Result<()>;
}

pub struct ArcService {
    repository: Arc<dyn ArcRepositoryTrait>,
    clock: SharedClock,
    nudge: PushNudge,
}

impl ArcService {
    pub fn new(
        repository: Arc<dyn ArcRepositoryTrait>,
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
impl ArcServiceTrait for ArcService {
    fn get_arc(&self, id: &str) -> Result<Option<StoryArc>> {
        self.repository.get_by_id(id)
    }

    fn list_arcs(&self) -> Result<Vec<StoryArc>> {
        self.repository.list()
    }

    async fn create_arc(&self, input: NewArc) -> Result<StoryArc> {
        if input.title.trim().is_empty() {
            return Err(Error::validation("Arc title must not be empty"));
        }
        let now = self.clock.now();
        let arc = StoryArc {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            description: input.description,
            status: ArcStatus::Active,
            sort_order: input.sort_order.unwrap_or(0),
            color_hex: input.color_hex,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            sync_state: SyncState::Pending,
            last_synced_at: None,
        };
        let draft = EventDraft::new(
            event_types::ARC_CREATED,
            Some(arc.id.clone()),
            &ArcEventPayload::from(&arc),
        )?;
        let saved = self.repository.save(arc, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }

    async fn update_arc(&self, mut arc: StoryArc) -> Result<StoryArc> {
        if self.repository.get_by_id(&arc.id)?.is_none() {
            return Err(Error::NotFound("Arc", arc.id));
        }
        arc.updated_at = self.clock.now();
        arc.sync_state = SyncState::Pending;

        let draft = EventDraft::new(
            event_types::ARC_UPDATED,
            Some(arc.id.clone()),
            &ArcEventPayload::from(&arc),
        )?;
        let saved = self.repository.save(arc, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }

    async fn delete_arc(&self, id: &str) -> Result<()> {
        let mut arc = self
            .repository
            .get_by_id(id)?
            .ok_or_else(|| Error::NotFound("Arc", id.to_string()))?;
        arc.is_deleted = true;
        arc.updated_at = self.clock.now();
        arc.sync_state = SyncState::Pending;

        let draft = EventDraft::new(
            event_types::ARC_DELETED,
            Some(arc.id.clone()),
            &EntityDeletedPayload { id: arc.id.clone() },
        )?;
        self.repository.save(arc, Some(draft)).await?;
        self.nudge.push();
        Ok(())
    }

    async fn reorder_arcs(&self, ids: Vec<String>, sort_orders: Vec<i32>) -> Result<()> {
        if ids.len() != sort_orders.len() {
            return Err(Error::validation(
                "Reorder ids and sort orders must have equal length",
            ));
        }
        if ids.is_empty() {
            return Ok(());
        }
        let now = self.clock.now();
        let payload = ReorderPayload {
            ids: ids.clone(),
            sort_orders: sort_orders.clone(),
        };
        let draft = EventDraft::new(event_types::ARC_REORDERED, None, &payload)?;
        let orders = ids.into_iter().zip(sort_orders).collect();
        self.repository.set_sort_orders(orders, now, Some(draft)).await?;
        self.nudge.push();
        Ok(())
    }
}
