//! Attachment metadata service. Blob transfer belongs to the host app; the
//! core only replicates metadata rows.

use super::{Attachment, AttachmentRepositoryTrait, UploadState};
use crate::clock::SharedClock;
use crate::errors::{Error, Result};
use crate::events::event_types;
use crate::events::{AttachmentEventPayload, EntityDeletedPayload, EventDraft};
use crate::reminders::ParentType;
use crate::sync::{PushNudge, SyncState};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Input for registering a new attachment.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub parent_id: String,
    pub parent_type: ParentType,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub local_path: Option<String>,
}

#[async_trait]
pub trait AttachmentServiceTrait: Send + Sync {
    fn get_attachment(&self, id: &str) -> Result<Option<Attachment>>;
    fn list_for_parent(&self, parent_id: &str) -> Result<Vec<Attachment>>;
    async fn register(&self, input: NewAttachment) -> Result<Attachment>;
    /// Records the uploaded blob's remote URL once the host finishes the
    /// transfer.
    async fn mark_uploaded(&self, id: &str, remote_url: String) -> Result<Attachment>;
    async fn mark_upload_failed(&self, id: &str) -> Result<Attachment>;
    async fn delete(&self, id: &str) -> Result<()>;
}

pub struct AttachmentService {
    repository: Arc<dyn AttachmentRepositoryTrait>,
    clock: SharedClock,
    nudge: PushNudge,
}

impl AttachmentService {
    pub fn new(
        repository: Arc<dyn AttachmentRepositoryTrait>,
        clock: SharedClock,
        nudge: PushNudge,
    ) -> Self {
        Self {
            repository,
            clock,
            nudge,
        }
    }

    fn require(&self, id: &str) -> Result<Attachment> {
        self.repository
            .get_by_id(id)?
            .ok_or_else(|| Error::NotFound("Attachment", id.to_string()))
    }

    async fn save_with_update_event(&self, attachment: Attachment) -> Result<Attachment> {
        let draft = EventDraft::new(
            event_types::ATTACHMENT_UPDATED,
            Some(attachment.id.clone()),
            &AttachmentEventPayload::from(&attachment),
        )?;
        let saved = self.repository.save(attachment, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }
}

#[async_trait]
impl AttachmentServiceTrait for AttachmentService {
    fn get_attachment(&self, id: &str) -> Result<Option<Attachment>> {
        self.repository.get_by_id(id)
    }

    fn list_for_parent(&self, parent_id: &str) -> Result<Vec<Attachment>> {
        self.repository.list_for_parent(parent_id)
    }

    async fn register(&self, input: NewAttachment) -> Result<Attachment> {
        let now = self.clock.now();
        let attachment = Attachment {
            id: Uuid::new_v4().to_string(),
            parent_id: input.parent_id,
            parent_type: input.parent_type,
            filename: input.filename,
            mime_type: input.mime_type,
            size_bytes: input.size_bytes,
            remote_url: None,
            local_path: input.local_path,
            upload_state: UploadState::Local,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            sync_state: SyncState::Pending,
            last_synced_at: None,
        };
        let draft = EventDraft::new(
            event_types::ATTACHMENT_CREATED,
            Some(attachment.id.clone()),
            &AttachmentEventPayload::from(&attachment),
        )?;
        let saved = self.repository.save(attachment, Some(draft)).await?;
        self.nudge.push();
        Ok(saved)
    }

    async fn mark_uploaded(&self, id: &str, remote_url: String) -> Result<Attachment> {
        let mut attachment = self.require(id)?;
        attachment.remote_url = Some(remote_url);
        attachment.upload_state = UploadState::Uploaded;
        attachment.updated_at = self.clock.now();
        attachment.sync_state = SyncState::Pending;
        self.save_with_update_event(attachment).await
    }

    async fn mark_upload_failed(&self, id: &str) -> Result<Attachment> {
        let mut attachment = self.require(id)?;
        attachment.upload_state = UploadState::Failed;
        attachment.updated_at = self.clock.now();
        attachment.sync_state = SyncState::Pending;
        self.save_with_update_event(attachment).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut attachment = self.require(id)?;
        attachment.is_deleted = true;
        attachment.updated_at = self.clock.now();
        attachment.sync_state = SyncState::Pending;

        let draft = EventDraft::new(
            event_types::ATTACHMENT_DELETED,
            Some(attachment.id.clone()),
            &EntityDeletedPayload {
                id: attachment.id.clone(),
            },
        )?;
        self.repository.save(attachment, Some(draft)).await?;
        self.nudge.push();
        Ok(())
    }
}
