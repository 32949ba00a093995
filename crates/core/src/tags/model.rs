//! Tag domain models, name normalization, and canonical ordering.

use crate::errors::Result;
use crate::events::EventDraft;
use crate::sync::SyncState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A user-defined label. Tags are unique by normalized name across all of a
/// user's devices; duplicates created offline are merged by the projector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color_hex: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub sync_state: SyncState,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Normalized form used for cross-device uniqueness: lowercased and trimmed.
pub fn normalize_tag_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Canonical ordering between two tags sharing a normalized name: the older
/// `created_at` wins; ties break on the lexicographically smaller id.
pub fn canonical_order(a: (&DateTime<Utc>, &str), b: (&DateTime<Utc>, &str)) -> Ordering {
    a.0.cmp(b.0).then_with(|| a.1.cmp(b.1))
}

/// Storage contract for tags.
#[async_trait]
pub trait TagRepositoryTrait: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Option<Tag>>;
    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Tag>>;
    fn list(&self) -> Result<Vec<Tag>>;
    /// Non-deleted tag whose normalized name matches, if any.
    fn find_by_normalized_name(&self, normalized: &str) -> Result<Option<Tag>>;
    async fn save(&self, tag: Tag, event: Option<EventDraft>) -> Result<Tag>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn normalization_lowercases_and_trims() {
        assert_eq!(normalize_tag_name("  Work "), "work");
        assert_eq!(normalize_tag_name("WORK"), "work");
    }

    #[test]
    fn older_created_at_is_canonical() {
        let older = Utc.timestamp_opt(100, 0).unwrap();
        let newer = Utc.timestamp_opt(200, 0).unwrap();
        assert_eq!(
            canonical_order((&older, "zzz"), (&newer, "aaa")),
            Ordering::Less
        );
    }

    #[test]
    fn created_at_tie_breaks_on_smaller_id() {
        let ts = Utc.timestamp_opt(100, 0).unwrap();
        assert_eq!(canonical_order((&ts, "aaa"), (&ts, "bbb")), Ordering::Less);
    }
}
