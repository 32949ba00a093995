//! Reminder service.

use super::{ParentType, Reminder, ReminderRepositoryTrait, ReminderStatus};
use crate::clock::SharedClock;
use crate::errors::{Error, Result};
use crate::events::event_types;
use crate::events::{EntityDeletedPayload, EventDraft, ReminderEventPayload};
use crate::sync::{PushNudge, SyncState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait ReminderServiceTrait: Send + Sync {
    fn get_reminder(&self, id: &str) -> Result<Option<Reminder>>;
    fn list_for_parent(&self, parent_id: &str) -> Result<Vec<Reminder>>;
    async fn schedule(
        &self,
        parent_id: String,
        parent_type: ParentType,
        remind_at: DateTime<Utc>,
    ) -> Result<Reminder>;
    async fn snooze(&self, id: &str, until: DateTime<Utc>) -> Result<Reminder>;
    async fn mark_fired(&self, id: &str) -> Result<Reminder>;
    async fn dismiss(&self, id: &str) -> Result<Reminder>;
    async fn delete(&self, id: &str) -> Result<()>;
}

pub struct ReminderService {
    repository: Arc<dyn ReminderRepositoryTrait>,
    clock: SharedClock,
    nudge: PushNudge,
}

impl ReminderService {
    pub fn new(
        repository: Arc<dyn ReminderRepositoryTrait>,
        clock: SharedClock,
        nudge: PushNudge,
    ) -> Self {
        Self {
            repository,
            clock,
            nudge,
        }
    }

    fn require(&self, id: &str) -> Result<Reminder> {
        self.repository
            .get_by_id(id)?
            .ok_or_else(|| Error::NotFound("Reminder", id.to_string()))
    }

    /// Reminder status events carry the full envelope: snooze moves
    /// `remind_at` as well as the status, and remote devices need both.
    async fn save_with_event(&self, reminder: Reminder, event_type: &str) -> Result<Reminder> {
        let draft = EventDraft::new(
            event_type,
            Some(reminder.id.clone()),
            &ReminderEventPayload::from(&reminder),
        )?;
        let saved = self.repository.save(reminder, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }
}

#[async_trait]
impl ReminderServiceTrait for ReminderService {
    fn get_reminder(&self, id: &str) -> Result<Option<Reminder>> {
        self.repository.get_by_id(id)
    }

    fn list_for_parent(&self, parent_id: &str) -> Result<Vec<Reminder>> {
        self.repository.list_for_parent(parent_id)
    }

    async fn schedule(
        &self,
        parent_id: String,
        parent_type: ParentType,
        remind_at: DateTime<Utc>,
    ) -> Result<Reminder> {
        let now = self.clock.now();
        let reminder = Reminder {
            id: Uuid::new_v4().to_string(),
            parent_id,
            parent_type,
            status: ReminderStatus::Scheduled,
            remind_at,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            sync_state: SyncState::Pending,
            last_synced_at: None,
        };
        self.save_with_event(reminder, event_types::REMINDER_CREATED)
            .await
    }

    async fn snooze(&self, id: &str, until: DateTime<Utc>) -> Result<Reminder> {
        let mut reminder = self.require(id)?;
        reminder.status = ReminderStatus::Snoozed;
        reminder.remind_at = until;
        reminder.updated_at = self.clock.now();
        reminder.sync_state = SyncState::Pending;
        self.save_with_event(reminder, event_types::REMINDER_SNOOZED)
            .await
    }

    async fn mark_fired(&self, id: &str) -> Result<Reminder> {
        let mut reminder = self.require(id)?;
        reminder.status = ReminderStatus::Fired;
        reminder.updated_at = self.clock.now();
        reminder.sync_state = SyncState::Pending;
        self.save_with_event(reminder, event_types::REMINDER_FIRED)
            .await
    }

    async fn dismiss(&self, id: &str) -> Result<Reminder> {
        let mut reminder = self.require(id)?;
        reminder.status = ReminderStatus::Dismissed;
        reminder.updated_at = self.clock.now();
        reminder.sync_state = SyncState::Pending;
        self.save_with_event(reminder, event_types::REMINDER_DISMISSED)
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut reminder = self.require(id)?;
        reminder.is_deleted = true;
        reminder.updated_at = self.clock.now();
        reminder.sync_state = SyncState::Pending;

        let draft = EventDraft::new(
            event_types::REMINDER_DELETED,
            Some(reminder.id.clone()),
            &EntityDeletedPayload {
                id: reminder.id.clone(),
            },
        )?;
        self.repository.save(reminder, Some(draft)).await?;
        self.nudge.push();
        Ok(())
    }
}
