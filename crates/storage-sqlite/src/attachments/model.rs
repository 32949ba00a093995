//! Database row for attachments.

use crate::db::{enum_from_db, enum_to_db, format_opt_ts, format_ts, parse_opt_ts, parse_ts};
use crate::errors::StorageError;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use taskdeck_core::attachments::Attachment;
use taskdeck_core::sync::SyncState;

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(treat_none_as_null = true)]
#[diesel(table_name = crate::schema::attachments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AttachmentDB {
    pub id: String,
    pub parent_id: String,
    pub parent_type: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub remote_url: Option<String>,
    pub local_path: Option<String>,
    pub upload_state: String,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: i32,
    pub sync_state: String,
    pub last_synced_at: Option<String>,
}

impl AttachmentDB {
    pub fn from_domain(attachment: &Attachment) -> Result<Self, StorageError> {
        Ok(Self {
            id: attachment.id.clone(),
            parent_id: attachment.parent_id.clone(),
            parent_type: enum_to_db(&attachment.parent_type)?,
            filename: attachment.filename.clone(),
            mime_type: attachment.mime_type.clone(),
            size_bytes: attachment.size_bytes,
            remote_url: attachment.remote_url.clone(),
            local_path: attachment.local_path.clone(),
            upload_state: enum_to_db(&attachment.upload_state)?,
            created_at: format_ts(attachment.created_at),
            updated_at: format_ts(attachment.updated_at),
            is_deleted: attachment.is_deleted as i32,
            sync_state: attachment.sync_state.as_str().to_string(),
            last_synced_at: format_opt_ts(attachment.last_synced_at),
        })
    }

    pub fn to_domain(self) -> Result<Attachment, StorageError> {
        Ok(Attachment {
            parent_type: enum_from_db(&self.parent_type)?,
            upload_state: enum_from_db(&self.upload_state)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            last_synced_at: parse_opt_ts(self.last_synced_at.as_deref())?,
            sync_state: SyncState::parse(&self.sync_state),
            id: self.id,
            parent_id: self.parent_id,
            filename: self.filename,
            mime_type: self.mime_type,
            size_bytes: self.size_bytes,
            remote_url: self.remote_url,
            local_path: self.local_path,
            is_deleted: self.is_deleted != 0,
        })
    }
}
