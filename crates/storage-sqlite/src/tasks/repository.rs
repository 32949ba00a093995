//! Queue task repository.

use super::model::TaskDB;
use crate::db::{format_ts, get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::events::record_event_tx;
use crate::schema::queue_tasks;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;
use taskdeck_core::errors::Result;
use taskdeck_core::events::EventDraft;
use taskdeck_core::sync::SyncState;
use taskdeck_core::tasks::{QueueTask, TaskRepositoryTrait};

pub struct TaskRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl TaskRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl TaskRepositoryTrait for TaskRepository {
    fn get_by_id(&self, id: &str) -> Result<Option<QueueTask>> {
        let mut conn = get_connection(&self.pool)?;
        let row = queue_tasks::table
            .find(id)
            .first::<TaskDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(TaskDB::to_domain).transpose()?)
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<QueueTask>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = get_connection(&self.pool)?;
        let rows = queue_tasks::table
            .filter(queue_tasks::id.eq_any(ids))
            .load::<TaskDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }

    fn list_for_stack(&self, stack_id: &str) -> Result<Vec<QueueTask>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = queue_tasks::table
            .filter(queue_tasks::stack_id.eq(stack_id))
            .order(queue_tasks::sort_order.asc())
            .load::<TaskDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }

    async fn save(&self, task: QueueTask, event: Option<EventDraft>) -> Result<QueueTask> {
        self.writer
            .exec(move |conn| {
                let row = TaskDB::from_domain(&task)?;
                diesel::insert_into(queue_tasks::table)
                    .values(&row)
                    .on_conflict(queue_tasks::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if let Some(draft) = event {
                    record_event_tx(conn, &draft, Utc::now())?;
                }
                Ok(task)
            })
            .await
    }

    async fn set_sort_orders(
        &self,
        orders: Vec<(String, i32)>,
        stamp: DateTime<Utc>,
        event: Option<EventDraft>,
    ) -> Result<()> {
        self.writer
            .exec(move |conn| {
                let stamp_text = format_ts(stamp);
                for (id, sort_order) in orders {
                    diesel::update(queue_tasks::table.find(id))
                        .set((
                            queue_tasks::sort_order.eq(sort_order),
                            queue_tasks::updated_at.eq(stamp_text.clone()),
                            queue_tasks::sync_state.eq(SyncState::Pending.as_str()),
                        ))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                if let Some(draft) = event {
                    record_event_tx(conn, &draft, stamp)?;
                }
                Ok(())
            })
            .await
    }
}
