//! Sync operation counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of sync operation counts
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    /// Sync actions started
    pub started: u64,
    /// Sync actions that settled successfully
    pub completed: u64,
    /// Sync actions that settled with an error
    pub failed: u64,
    /// Sync actions whose cancellation token was signalled by a
    /// later start
    pub superseded: u64,
}

/// Lock-free collector behind the coordinator's dispatch and
/// settlement paths
#[derive(Debug, Default)]
pub struct SyncStatsCollector {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    superseded: AtomicU64,
}

impl SyncStatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_superseded(&self) {
        self.superseded.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counters as an owned snapshot
    pub fn snapshot(&self) -> SyncStats {
        SyncStats {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
        }
    }
}
