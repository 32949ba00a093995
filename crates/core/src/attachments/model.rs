//! Attachment domain models and repository contract.

use crate::errors::Result;
use crate::events::EventDraft;
use crate::reminders::ParentType;
use crate::sync::SyncState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upload lifecycle of an attachment blob. The transfer itself is owned by
/// the host application; the core only replicates the metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Local,
    Uploading,
    Uploaded,
    Failed,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Local => "local",
            UploadState::Uploading => "uploading",
            UploadState::Uploaded => "uploaded",
            UploadState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub parent_id: String,
    pub parent_type: ParentType,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub remote_url: Option<String>,
    /// Device-local path; never replicated as-is, other devices re-download.
    pub local_path: Option<String>,
    pub upload_state: UploadState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub sync_state: SyncState,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Storage contract for attachments.
#[async_trait]
pub trait AttachmentRepositoryTrait: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Option<Attachment>>;
    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Attachment>>;
    fn list_for_parent(&self, parent_id: &str) -> Result<Vec<Attachment>>;
    async fn save(&self, attachment: Attachment, event: Option<EventDraft>) -> Result<Attachment>;
}
