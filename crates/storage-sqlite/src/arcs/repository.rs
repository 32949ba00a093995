//! Arc repository.

use super::model::ArcDB;
use crate::db::{format_ts, get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::events::record_event_tx;
use crate::schema::arcs;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;
use taskdeck_core::arcs::{ArcRepositoryTrait, StoryArc};
use taskdeck_core::errors::Result;
use taskdeck_core::events::EventDraft;
use taskdeck_core::sync::SyncState;

pub struct ArcRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl ArcRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl ArcRepositoryTrait for ArcRepository {
    fn get_by_id(&self, id: &str) -> Result<Option<StoryArc>> {
        let mut conn = get_connection(&self.pool)?;
        let row = arcs::table
            .find(id)
            .first::<ArcDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(ArcDB::to_domain).transpose()?)
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoryArc>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = get_connection(&self.pool)?;
        let rows = arcs::table
            .filter(arcs::id.eq_any(ids))
            .load::<ArcDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }

    fn list(&self) -> Result<Vec<StoryArc>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = arcs::table
            .filter(arcs::is_deleted.eq(0))
            .order(arcs::sort_order.asc())
            .load::<ArcDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }

    async fn save(&self, arc: StoryArc, event: Option<EventDraft>) -> Result<StoryArc> {
        self.writer
            .exec(move |conn| {
                let row = ArcDB::from_domain(&arc)?;
                diesel::insert_into(arcs::table)
                    .values(&row)
                    .on_conflict(arcs::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if let Some(draft) = event {
                    record_event_tx(conn, &draft, Utc::now())?;
                }
                Ok(arc)
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
                    diesel::update(arcs::table.find(id))
                        .set((
                            arcs::sort_order.eq(sort_order),
                            arcs::updated_at.eq(stamp_text.clone()),
                            arcs::sync_state.eq(SyncState::Pending.as_str()),
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
