//! Initial-sync progress counters, observable by the UI.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Shared counters updated by the engine while the first pull runs.
#[derive(Debug, Default)]
pub struct InitialSyncProgress {
    in_progress: AtomicBool,
    processed: AtomicUsize,
    total: AtomicUsize,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialSyncSnapshot {
    pub in_progress: bool,
    pub processed: usize,
    pub total: usize,
}

impl InitialSyncProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips `in_progress` on at the start of an initial sync.
    pub fn begin(&self) {
        self.processed.store(0, Ordering::Relaxed);
        self.total.store(0, Ordering::Relaxed);
        self.in_progress.store(true, Ordering::Relaxed);
    }

    pub fn add_total(&self, count: usize) {
        self.total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_processed(&self, count: usize) {
        self.processed.fetch_add(count, Ordering::Relaxed);
    }

    /// Flips `in_progress` off; called on completion or failure.
    pub fn finish(&self) {
        self.in_progress.store(false, Ordering::Relaxed);
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> InitialSyncSnapshot {
        InitialSyncSnapshot {
            in_progress: self.in_progress.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
        }
    }
}
