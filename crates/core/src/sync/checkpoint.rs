//! Pull-cursor persistence contract.

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

/// Durable store for the opaque server-issued pull checkpoint.
///
/// An absent checkpoint means the device has never completed a pull; the
/// first pull is the initial sync and starts from the Unix epoch.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    fn get(&self) -> Result<Option<String>>;
    async fn set(&self, checkpoint: String) -> Result<()>;
}

/// The `since` value used when no checkpoint has been persisted yet.
pub fn epoch_checkpoint() -> String {
    DateTime::<Utc>::UNIX_EPOCH.to_rfc3339_opts(SecondsFormat::Millis, true)
}
