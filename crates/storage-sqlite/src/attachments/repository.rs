//! Attachment repository.

use super::model::AttachmentDB;
use crate::db::{get_connection, SqlitePool, WriteHandle};
use crate::errors::StorageError;
use crate::events::record_event_tx;
use crate::schema::attachments;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;
use taskdeck_core::attachments::{Attachment, AttachmentRepositoryTrait};
use taskdeck_core::errors::Result;
use taskdeck_core::events::EventDraft;

pub struct AttachmentRepository {
    pool: Arc<SqlitePool>,
    writer: WriteHandle,
}

impl AttachmentRepository {
    pub fn new(pool: Arc<SqlitePool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl AttachmentRepositoryTrait for AttachmentRepository {
    fn get_by_id(&self, id: &str) -> Result<Option<Attachment>> {
        let mut conn = get_connection(&self.pool)?;
        let row = attachments::table
            .find(id)
            .first::<AttachmentDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(AttachmentDB::to_domain).transpose()?)
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Attachment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = get_connection(&self.pool)?;
        let rows = attachments::table
            .filter(attachments::id.eq_any(ids))
            .load::<AttachmentDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }

    fn list_for_parent(&self, parent_id: &str) -> Result<Vec<Attachment>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = attachments::table
            .filter(attachments::parent_id.eq(parent_id))
            .filter(attachments::is_deleted.eq(0))
            .order(attachments::created_at.asc())
            .load::<AttachmentDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.to_domain()?)).collect()
    }

    async fn save(&self, attachment: Attachment, event: Option<EventDraft>) -> Result<Attachment> {
        self.writer
            .exec(move |conn| {
                let row = AttachmentDB::from_domain(&attachment)?;
                diesel::insert_into(attachments::table)
                    .values(&row)
                    .on_conflict(attachments::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if let Some(draft) = event {
                    record_event_tx(conn, &draft, Utc::now())?;
                }
                Ok(attachment)
            })
            .await
    }
}
