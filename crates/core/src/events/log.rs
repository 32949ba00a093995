//! Event log contract.

use super::{Event, EventDraft, RemoteEvent};
use crate::errors::Result;
use async_trait::async_trait;

/// Append-only store for the per-device event queue.
///
/// Implementations stamp identity (`user_id`, `device_id`, `app_id`) from the
/// durable device identity and guarantee the row is persisted before
/// `record` returns. Entity repositories append events through the same
/// storage transaction as the domain mutation; this trait is the standalone
/// surface for the emitter, transport, and audit views.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Persist a new local event. Fresh id, clock timestamp, current payload
    /// version, `is_synced = false`.
    async fn record(&self, draft: EventDraft) -> Result<Event>;

    /// All unsynced events, ordered by timestamp ascending, ready for push.
    fn fetch_pending(&self) -> Result<Vec<Event>>;

    /// Number of events still awaiting acknowledgement.
    fn pending_count(&self) -> Result<i64>;

    /// Mark relay-acknowledged events synced.
    async fn mark_synced(&self, ids: Vec<String>) -> Result<()>;

    /// Dead-letter relay-rejected events; they are never pushed again.
    async fn mark_rejected(&self, ids: Vec<String>, error: Option<String>) -> Result<()>;

    /// Audit trail for one entity, ordered by timestamp descending.
    fn history_for(&self, entity_id: &str) -> Result<Vec<Event>>;

    /// Duplicate detection for inbound events.
    fn exists(&self, event_id: &str) -> Result<bool>;

    /// Persist an inbound event as already-synced, for dedup and audit.
    async fn record_remote(&self, event: RemoteEvent, entity_id: Option<String>) -> Result<()>;
}
