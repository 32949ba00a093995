//! Task service: local mutations paired with event emission.

use super::{NewTask, QueueTask, TaskRepositoryTrait, TaskStatus, TaskUpdate};
use crate::clock::SharedClock;
use crate::errors::{Error, Result};
use crate::events::event_types;
use crate::events::{
    EntityDeletedPayload, EntityStatusPayload, EventDraft, ReorderPayload, TaskEventPayload,
};
use crate::stacks::StackRepositoryTrait;
use crate::sync::{PushNudge, SyncState};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait TaskServiceTrait: Send + Sync {
    fn get_task(&self, id: &str) -> Result<Option<QueueTask>>;
    fn list_tasks_for_stack(&self, stack_id: &str) -> Result<Vec<QueueTask>>;
    async fn create_task(&self, input: NewTask) -> Result<QueueTask>;
    async fn update_task(&self, id: &str, update: TaskUpdate) -> Result<QueueTask>;
    /// Brings the task to the front of its stack and marks it as the stack's
    /// active task.
    async fn activate_task(&self, id: &str) -> Result<QueueTask>;
    async fn complete_task(&self, id: &str) -> Result<QueueTask>;
    async fn close_task(&self, id: &str) -> Result<QueueTask>;
    async fn delete_task(&self, id: &str) -> Result<()>;
    async fn reorder_tasks(&self, ids: Vec<String>, sort_orders: Vec<i32>) -> Result<()>;
}

pub struct TaskService {
    repository: Arc<dyn TaskRepositoryTrait>,
    stacks: Arc<dyn StackRepositoryTrait>,
    clock: SharedClock,
    nudge: PushNudge,
}

impl TaskService {
    pub fn new(
        repository: Arc<dyn TaskRepositoryTrait>,
        stacks: Arc<dyn StackRepositoryTrait>,
        clock: SharedClock,
        nudge: PushNudge,
    ) -> Self {
        Self {
            repository,
            stacks,
            clock,
            nudge,
        }
    }

    fn require(&self, id: &str) -> Result<QueueTask> {
        self.repository
            .get_by_id(id)?
            .ok_or_else(|| Error::NotFound("Task", id.to_string()))
    }

    async fn save_with_status_event(&self, task: QueueTask, event_type: &str) -> Result<QueueTask> {
        let draft = EventDraft::new(
            event_type,
            Some(task.id.clone()),
            &EntityStatusPayload { id: task.id.clone() },
        )?;
        let saved = self.repository.save(task, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }
}

#[async_trait]
impl TaskServiceTrait for TaskService {
    fn get_task(&self, id: &str) -> Result<Option<QueueTask>> {
        self.repository.get_by_id(id)
    }

    fn list_tasks_for_stack(&self, stack_id: &str) -> Result<Vec<QueueTask>> {
        self.repository.list_for_stack(stack_id)
    }

    async fn create_task(&self, input: NewTask) -> Result<QueueTask> {
        if input.title.trim().is_empty() {
            return Err(Error::validation("Task title must not be empty"));
        }
        let now = self.clock.now();
        let task = QueueTask {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            description: input.description,
            status: TaskStatus::Pending,
            priority: input.priority,
            sort_order: input.sort_order.unwrap_or(0),
            last_active_time: None,
            stack_id: input.stack_id,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            sync_state: SyncState::Pending,
            last_synced_at: None,
        };
        let draft = EventDraft::new(
            event_types::TASK_CREATED,
            Some(task.id.clone()),
            &TaskEventPayload::from(&task),
        )?;
        let saved = self.repository.save(task, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }

    async fn update_task(&self, id: &str, update: TaskUpdate) -> Result<QueueTask> {
        let mut task = self.require(id)?;
        if let Some(title) = update.title {
            task.title = title;
        }
        if let Some(description) = update.description {
            task.description = description;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(sort_order) = update.sort_order {
            task.sort_order = sort_order;
        }
        if let Some(stack_id) = update.stack_id {
            task.stack_id = stack_id;
        }
        task.updated_at = self.clock.now();
        task.sync_state = SyncState::Pending;

        let draft = EventDraft::new(
            event_types::TASK_UPDATED,
            Some(task.id.clone()),
            &TaskEventPayload::from(&task),
        )?;
        let saved = self.repository.save(task, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }

    async fn activate_task(&self, id: &str) -> Result<QueueTask> {
        let mut task = self.require(id)?;
        let now = self.clock.now();
        task.status = TaskStatus::Pending;
        task.sort_order = 0;
        task.last_active_time = Some(now);
        task.updated_at = now;
        task.sync_state = SyncState::Pending;

        // Co-mutation: the parent stack tracks its active task. Remote
        // devices derive the same change when they project task.activated.
        if let Some(stack_id) = task.stack_id.clone() {
            if let Some(mut stack) = self.stacks.get_by_id(&stack_id)? {
                stack.active_task_id = Some(task.id.clone());
                stack.updated_at = now;
                stack.sync_state = SyncState::Pending;
                self.stacks.save(stack, None).await?;
            }
        }

        self.save_with_status_event(task, event_types::TASK_ACTIVATED)
            .await
    }

    async fn complete_task(&self, id: &str) -> Result<QueueTask> {
        let mut task = self.require(id)?;
        task.status = TaskStatus::Completed;
        task.updated_at = self.clock.now();
        task.sync_state = SyncState::Pending;
        self.save_with_status_event(task, event_types::TASK_COMPLETED)
            .await
    }

    async fn close_task(&self, id: &str) -> Result<QueueTask> {
        let mut task = self.require(id)?;
        task.status = TaskStatus::Closed;
        task.updated_at = self.clock.now();
        task.sync_state = SyncState::Pending;
        self.save_with_status_event(task, event_types::TASK_CLOSED)
            .await
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        let mut task = self.require(id)?;
        task.is_deleted = true;
        task.updated_at = self.clock.now();
        task.sync_state = SyncState::Pending;

        let draft = EventDraft::new(
            event_types::TASK_DELETED,
            Some(task.id.clone()),
            &EntityDeletedPayload { id: task.id.clone() },
        )?;
        self.repository.save(task, Some(draft)).await?;
        self.nudge.push();
        Ok(())
    }

    async fn reorder_tasks(&self, ids: Vec<String>, sort_orders: Vec<i32>) -> Result<()> {
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
        let draft = EventDraft::new(event_types::TASK_REORDERED, None, &payload)?;
        let orders = ids.into_iter().zip(sort_orders).collect();
        self.repository.set_sort_orders(orders, now, Some(draft)).await?;
        self.nudge.push();
        Ok(())
    }
}
