//! Tag reconciliation state: pending associations and ID remappings.

use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct ReconcilerState {
    /// `duplicate_tag_id -> canonical_tag_id`, chased transitively.
    remap: HashMap<String, String>,
    /// Stack ids waiting for a tag id the projector has not seen yet.
    pending: HashMap<String, HashSet<String>>,
}

/// Single-owner component for the cross-event tag bookkeeping.
///
/// Both tables are process-wide and in-memory only; they are rebuilt
/// naturally when events are reprocessed, which is idempotent under LWW.
/// All access goes through this mutex so the projector path is the only
/// writer.
#[derive(Debug, Default)]
pub struct TagReconciler {
    state: Mutex<ReconcilerState>,
}

impl TagReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a wire tag id to its canonical local id.
    pub async fn resolve_id(&self, tag_id: &str) -> String {
        let state = self.state.lock().await;
        let mut current = tag_id;
        let mut hops = 0;
        while let Some(next) = state.remap.get(current) {
            current = next;
            // A cycle would mean two tags each canonicalized to the other;
            // bail out rather than spin.
            hops += 1;
            if hops > 16 {
                break;
            }
        }
        current.to_string()
    }

    /// Register `duplicate -> canonical` so future payloads still naming the
    /// duplicate resolve to the surviving tag.
    pub async fn add_mapping(&self, duplicate: String, canonical: String) {
        if duplicate == canonical {
            return;
        }
        let mut state = self.state.lock().await;
        state.remap.insert(duplicate, canonical);
    }

    /// Park a stack→tag link until the tag shows up.
    pub async fn add_pending(&self, tag_id: String, stack_id: String) {
        let mut state = self.state.lock().await;
        state.pending.entry(tag_id).or_default().insert(stack_id);
    }

    /// Drain the stacks parked on `tag_id`, if any.
    pub async fn take_pending(&self, tag_id: &str) -> HashSet<String> {
        let mut state = self.state.lock().await;
        state.pending.remove(tag_id).unwrap_or_default()
    }

    #[cfg(test)]
    pub async fn pending_for(&self, tag_id: &str) -> HashSet<String> {
        let state = self.state.lock().await;
        state.pending.get(tag_id).cloned().unwrap_or_default()
    }
}
