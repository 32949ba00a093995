//! Stack service: local mutations paired with event emission.

use super::{NewStack, Stack, StackRepositoryTrait, StackStatus, StackUpdate};
use crate::clock::SharedClock;
use crate::errors::{Error, Result};
use crate::events::event_types;
use crate::events::{
    EntityDeletedPayload, EntityStatusPayload, EventDraft, ReorderPayload, StackArcAssignmentPayload,
    StackEventPayload,
};
use crate::sync::{PushNudge, SyncState};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait StackServiceTrait: Send + Sync {
    fn get_stack(&self, id: &str) -> Result<Option<Stack>>;
    fn list_stacks(&self) -> Result<Vec<Stack>>;
    async fn create_stack(&self, input: NewStack) -> Result<Stack>;
    async fn update_stack(&self, id: &str, update: StackUpdate) -> Result<Stack>;
    /// Makes this stack the single active one; any other active stack is
    /// deactivated in the same call.
    async fn activate_stack(&self, id: &str) -> Result<Stack>;
    async fn deactivate_stack(&self, id: &str) -> Result<Stack>;
    async fn complete_stack(&self, id: &str) -> Result<Stack>;
    async fn close_stack(&self, id: &str) -> Result<Stack>;
    async fn archive_stack(&self, id: &str) -> Result<Stack>;
    /// Soft delete. Drafts emit `stack.discarded`, everything else
    /// `stack.deleted`.
    async fn delete_stack(&self, id: &str) -> Result<()>;
    async fn reorder_stacks(&self, ids: Vec<String>, sort_orders: Vec<i32>) -> Result<()>;
    async fn assign_arc(&self, stack_id: &str, arc_id: Option<String>) -> Result<Stack>;
}

pub struct StackService {
    repository: Arc<dyn StackRepositoryTrait>,
    clock: SharedClock,
    nudge: PushNudge,
}

impl StackService {
    pub fn new(
        repository: Arc<dyn StackRepositoryTrait>,
        clock: SharedClock,
        nudge: PushNudge,
    ) -> Self {
        Self {
            repository,
            clock,
            nudge,
        }
    }

    fn require(&self, id: &str) -> Result<Stack> {
        self.repository
            .get_by_id(id)?
            .ok_or_else(|| Error::NotFound("Stack", id.to_string()))
    }

    async fn save_with_status_event(&self, stack: Stack, event_type: &str) -> Result<Stack> {
        let draft = EventDraft::new(
            event_type,
            Some(stack.id.clone()),
            &EntityStatusPayload {
                id: stack.id.clone(),
            },
        )?;
        let saved = self.repository.save(stack, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }
}

#[async_trait]
impl StackServiceTrait for StackService {
    fn get_stack(&self, id: &str) -> Result<Option<Stack>> {
        self.repository.get_by_id(id)
    }

    fn list_stacks(&self) -> Result<Vec<Stack>> {
        self.repository.list()
    }

    async fn create_stack(&self, input: NewStack) -> Result<Stack> {
        if input.title.trim().is_empty() {
            return Err(Error::validation("Stack title must not be empty"));
        }
        let now = self.clock.now();
        let stack = Stack {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            description: input.description,
            status: StackStatus::Active,
            priority: input.priority,
            sort_order: input.sort_order.unwrap_or(0),
            is_draft: input.is_draft,
            is_active: false,
            active_task_id: None,
            arc_id: input.arc_id,
            tag_ids: input.tag_ids,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            sync_state: SyncState::Pending,
            last_synced_at: None,
        };
        let draft = EventDraft::new(
            event_types::STACK_CREATED,
            Some(stack.id.clone()),
            &StackEventPayload::from(&stack),
        )?;
        let saved = self.repository.save(stack, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }

    async fn update_stack(&self, id: &str, update: StackUpdate) -> Result<Stack> {
        let mut stack = self.require(id)?;
        if let Some(title) = update.title {
            stack.title = title;
        }
        if let Some(description) = update.description {
            stack.description = description;
        }
        if let Some(priority) = update.priority {
            stack.priority = priority;
        }
        if let Some(sort_order) = update.sort_order {
            stack.sort_order = sort_order;
        }
        if let Some(is_draft) = update.is_draft {
            stack.is_draft = is_draft;
        }
        if let Some(arc_id) = update.arc_id {
            stack.arc_id = arc_id;
        }
        if let Some(tag_ids) = update.tag_ids {
            stack.tag_ids = tag_ids;
        }
        stack.updated_at = self.clock.now();
        stack.sync_state = SyncState::Pending;

        let draft = EventDraft::new(
            event_types::STACK_UPDATED,
            Some(stack.id.clone()),
            &StackEventPayload::from(&stack),
        )?;
        let saved = self.repository.save(stack, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }

    async fn activate_stack(&self, id: &str) -> Result<Stack> {
        let mut stack = self.require(id)?;
        if stack.is_deleted {
            return Err(Error::validation("Cannot activate a deleted stack"));
        }
        let now = self.clock.now();

        // Deactivate whichever stack currently holds the flag. The remote
        // projector derives the same deactivation from the activated event's
        // timestamp, so no extra events are emitted for the losers.
        let others: Vec<Stack> = self
            .repository
            .list_active()?
            .into_iter()
            .filter(|other| other.id != stack.id)
            .map(|mut other| {
                other.is_active = false;
                other.updated_at = now;
                other.sync_state = SyncState::Pending;
                other
            })
            .collect();
        if !others.is_empty() {
            self.repository.save_batch(others).await?;
        }

        stack.is_active = true;
        stack.status = StackStatus::Active;
        stack.updated_at = now;
        stack.sync_state = SyncState::Pending;
        self.save_with_status_event(stack, event_types::STACK_ACTIVATED)
            .await
    }

    async fn deactivate_stack(&self, id: &str) -> Result<Stack> {
        let mut stack = self.require(id)?;
        stack.is_active = false;
        stack.updated_at = self.clock.now();
        stack.sync_state = SyncState::Pending;
        self.save_with_status_event(stack, event_types::STACK_DEACTIVATED)
            .await
    }

    async fn complete_stack(&self, id: &str) -> Result<Stack> {
        let mut stack = self.require(id)?;
        stack.status = StackStatus::Completed;
        // Completed stacks are never the active one.
        stack.is_active = false;
        stack.updated_at = self.clock.now();
        stack.sync_state = SyncState::Pending;
        self.save_with_status_event(stack, event_types::STACK_COMPLETED)
            .await
    }

    async fn close_stack(&self, id: &str) -> Result<Stack> {
        let mut stack = self.require(id)?;
        stack.status = StackStatus::Closed;
        stack.is_active = false;
        stack.updated_at = self.clock.now();
        stack.sync_state = SyncState::Pending;
        self.save_with_status_event(stack, event_types::STACK_CLOSED)
            .await
    }

    async fn archive_stack(&self, id: &str) -> Result<Stack> {
        let mut stack = self.require(id)?;
        stack.status = StackStatus::Archived;
        stack.is_active = false;
        stack.updated_at = self.clock.now();
        stack.sync_state = SyncState::Pending;
        self.save_with_status_event(stack, event_types::STACK_ARCHIVED)
            .await
    }

    async fn delete_stack(&self, id: &str) -> Result<()> {
        let mut stack = self.require(id)?;
        let event_type = if stack.is_draft {
            event_types::STACK_DISCARDED
        } else {
            event_types::STACK_DELETED
        };
        stack.is_deleted = true;
        stack.is_active = false;
        stack.updated_at = self.clock.now();
        stack.sync_state = SyncState::Pending;

        let draft = EventDraft::new(
            event_type,
            Some(stack.id.clone()),
            &EntityDeletedPayload {
                id: stack.id.clone(),
            },
        )?;
        self.repository.save(stack, Some(draft)).await?;
        self.nudge.push();
        Ok(())
    }

    async fn reorder_stacks(&self, ids: Vec<String>, sort_orders: Vec<i32>) -> Result<()> {
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
        let draft = EventDraft::new(event_types::STACK_REORDERED, None, &payload)?;
        let orders = ids.into_iter().zip(sort_orders).collect();
        self.repository.set_sort_orders(orders, now, Some(draft)).await?;
        self.nudge.push();
        Ok(())
    }

    async fn assign_arc(&self, stack_id: &str, arc_id: Option<String>) -> Result<Stack> {
        let mut stack = self.require(stack_id)?;
        stack.arc_id = arc_id.clone();
        stack.updated_at = self.clock.now();
        stack.sync_state = SyncState::Pending;

        let draft = EventDraft::new(
            event_types::STACK_ARC_ASSIGNED,
            Some(stack.id.clone()),
            &StackArcAssignmentPayload {
                stack_id: stack.id.clone(),
                arc_id,
            },
        )?;
        let saved = self.repository.save(stack, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::fixed::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStacks {
        stacks: Mutex<HashMap<String, Stack>>,
        drafts: Mutex<Vec<EventDraft>>,
    }

    impl MemoryStacks {
        fn get(&self, id: &str) -> Stack {
            self.stacks.lock().unwrap().get(id).cloned().expect("stack")
        }
    }

    #[async_trait]
    impl StackRepositoryTrait for MemoryStacks {
        fn get_by_id(&self, id: &str) -> Result<Option<Stack>> {
            Ok(self.stacks.lock().unwrap().get(id).cloned())
        }

        fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Stack>> {
            let stacks = self.stacks.lock().unwrap();
            Ok(ids.iter().filter_map(|id| stacks.get(id).cloned()).collect())
        }

        fn list(&self) -> Result<Vec<Stack>> {
            Ok(self.stacks.lock().unwrap().values().cloned().collect())
        }

        fn list_active(&self) -> Result<Vec<Stack>> {
            Ok(self
                .stacks
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.is_active && !s.is_deleted)
                .cloned()
                .collect())
        }

        async fn save(&self, stack: Stack, event: Option<EventDraft>) -> Result<Stack> {
            if let Some(draft) = event {
                self.drafts.lock().unwrap().push(draft);
            }
            self.stacks
                .lock()
                .unwrap()
                .insert(stack.id.clone(), stack.clone());
            Ok(stack)
        }

        async fn save_batch(&self, batch: Vec<Stack>) -> Result<()> {
            let mut stacks = self.stacks.lock().unwrap();
            for stack in batch {
                stacks.insert(stack.id.clone(), stack);
            }
            Ok(())
        }

        async fn set_sort_orders(
            &self,
            orders: Vec<(String, i32)>,
            stamp: chrono::DateTime<Utc>,
            event: Option<EventDraft>,
        ) -> Result<()> {
            if let Some(draft) = event {
                self.drafts.lock().unwrap().push(draft);
            }
            let mut stacks = self.stacks.lock().unwrap();
            for (id, sort_order) in orders {
                if let Some(stack) = stacks.get_mut(&id) {
                    stack.sort_order = sort_order;
                    stack.updated_at = stamp;
                }
            }
            Ok(())
        }

        async fn replace_tag_references(
            &self,
            _from_tag_id: &str,
            _to_tag_id: &str,
        ) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn service(repo: Arc<MemoryStacks>) -> StackService {
        let clock = Arc::new(FixedClock::at(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        StackService::new(repo, clock, PushNudge::disconnected())
    }

    #[tokio::test]
    async fn activate_deactivates_the_previous_active_stack() {
        let repo = Arc::new(MemoryStacks::default());
        let svc = service(repo.clone());

        let a = svc
            .create_stack(NewStack {
                title: "A".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let b = svc
            .create_stack(NewStack {
                title: "B".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        svc.activate_stack(&a.id).await.unwrap();
        svc.activate_stack(&b.id).await.unwrap();

        assert!(!repo.get(&a.id).is_active);
        assert!(repo.get(&b.id).is_active);
        let active_count = repo
            .stacks
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_active)
            .count();
        assert_eq!(active_count, 1);
    }

    #[tokio::test]
    async fn completing_clears_the_active_flag() {
        let repo = Arc::new(MemoryStacks::default());
        let svc = service(repo.clone());

        let stack = svc
            .create_stack(NewStack {
                title: "Ship".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        svc.activate_stack(&stack.id).await.unwrap();
        let completed = svc.complete_stack(&stack.id).await.unwrap();

        assert_eq!(completed.status, StackStatus::Completed);
        assert!(!completed.is_active);
    }

    #[tokio::test]
    async fn deleting_a_draft_emits_discarded() {
        let repo = Arc::new(MemoryStacks::default());
        let svc = service(repo.clone());

        let draft_stack = svc
            .create_stack(NewStack {
                title: "Scratch".into(),
                is_draft: true,
                ..Default::default()
            })
            .await
            .unwrap();
        svc.delete_stack(&draft_stack.id).await.unwrap();

        let drafts = repo.drafts.lock().unwrap();
        assert_eq!(
            drafts.last().unwrap().event_type,
            event_types::STACK_DISCARDED
        );
        drop(drafts);
        assert!(repo.get(&draft_stack.id).is_deleted);
    }

    #[tokio::test]
    async fn reorder_requires_parallel_arrays() {
        let svc = service(Arc::new(MemoryStacks::default()));
        let result = svc
            .reorder_stacks(vec!["a".into(), "b".into()], vec![1])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reorder_emits_one_event_with_parallel_payload() {
        let repo = Arc::new(MemoryStacks::default());
        let svc = service(repo.clone());

        let a = svc
            .create_stack(NewStack {
                title: "A".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let b = svc
            .create_stack(NewStack {
                title: "B".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        svc.reorder_stacks(vec![a.id.clone(), b.id.clone()], vec![2, 1])
            .await
            .unwrap();

        let drafts = repo.drafts.lock().unwrap();
        let reorder = drafts.last().unwrap();
        assert_eq!(reorder.event_type, event_types::STACK_REORDERED);
        assert_eq!(reorder.payload["ids"][0], a.id);
        assert_eq!(reorder.payload["sortOrders"][0], 2);
        drop(drafts);
        assert_eq!(repo.get(&a.id).sort_order, 2);
        assert_eq!(repo.get(&b.id).sort_order, 1);
    }
}
