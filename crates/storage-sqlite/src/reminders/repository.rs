//! Reminder repository.

use super::model::ReminderDB;
use crate::db::{get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::events::record_event_tx;
use crate::schema::reminders;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;
use taskdeck_core::errors::Result;
use taskdeck_core::events::EventDraft;
use taskdeck_core::reminders::{Reminder, ReminderRepositoryTrait};

pub struct ReminderRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl ReminderRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl ReminderRepositoryTrait for ReminderRepository {
    fn get_by_id(&self, id: &str) -> Result<Option<Reminder>> {
        let mut conn = get_connection(&self.pool)?;
        let row = reminders::table
            .find(id)
            .first::<ReminderDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(ReminderDB::to_domain).transpose()?)
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Reminder>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = get_connection(&self.pool)?;
        let rows = reminders::table
            .filter(reminders::id.eq_any(ids))
            .load::<ReminderDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }

    fn list_for_parent(&self, parent_id: &str) -> Result<Vec<Reminder>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = reminders::table
            .filter(reminders::parent_id.eq(parent_id))
            .filter(reminders::is_deleted.eq(0))
            .order(reminders::remind_at.asc())
            .load::<ReminderDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }

    async fn save(&self, reminder: Reminder, event: Option<EventDraft>) -> Result<Reminder> {
        self.writer
            .exec(move |conn| {
                let row = ReminderDB::from_domain(&reminder)?;
                diesel::insert_into(reminders::table)
                    .values(&row)
                    .on_conflict(reminders::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if let Some(draft) = event {
                    record_event_tx(conn, &draft, Utc::now())?;
                }
                Ok(reminder)
            })
            .await
    }
}
