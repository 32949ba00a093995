//! Tag repository.

use super::model::TagDB;
use crate::db::{get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::events::record_event_tx;
use crate::schema::tags;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;
use taskdeck_core::errors::Result;
use taskdeck_core::events::EventDraft;
use taskdeck_core::tags::{Tag, TagRepositoryTrait};

pub struct TagRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl TagRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl TagRepositoryTrait for TagRepository {
    fn get_by_id(&self, id: &str) -> Result<Option<Tag>> {
        let mut conn = get_connection(&self.pool)?;
        let row = tags::table
            .find(id)
            .first::<TagDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(TagDB::to_domain).transpose()?)
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Tag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = get_connection(&self.pool)?;
        let rows = tags::table
            .filter(tags::id.eq_any(ids))
            .load::<TagDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }

    fn list(&self) -> Result<Vec<Tag>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = tags::table
            .filter(tags::is_deleted.eq(0))
            .order(tags::normalized_name.asc())
            .load::<TagDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }

    fn find_by_normalized_name(&self, normalized: &str) -> Result<Option<Tag>> {
        let mut conn = get_connection(&self.pool)?;
        let row = tags::table
            .filter(tags::normalized_name.eq(normalized))
            .filter(tags::is_deleted.eq(0))
            .order(tags::created_at.asc())
            .first::<TagDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(TagDB::to_domain).transpose()?)
    }

    async fn save(&self, tag: Tag, event: Option<EventDraft>) -> Result<Tag> {
        self.writer
            .exec(move |conn| {
                let row = TagDB::from_domain(&tag);
                diesel::insert_into(tags::table)
                    .values(&row)
                    .on_conflict(tags::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if let Some(draft) = event {
                    record_event_tx(conn, &draft, Utc::now())?;
                }
                Ok(tag)
            })
            .await
    }
}
