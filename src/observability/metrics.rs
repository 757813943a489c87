//! WAL engine counters
//!
//! Counters only, monotonic, reset on process start. Relaxed atomics: a
//! snapshot is not a consistent cut across counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    wal_bytes_written: AtomicU64,
    wal_records_written: AtomicU64,
    flush_batches: AtomicU64,
    wal_swaps: AtomicU64,
    empty_entries_skipped: AtomicU64,
    submissions_rejected: AtomicU64,
    commit_state_regressions: AtomicU64,
    checkpoints_created: AtomicU64,
    entries_replayed: AtomicU64,
    wal_files_purged: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_wal_bytes(&self, bytes: u64) {
        self.wal_bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn increment_wal_records(&self) {
        self.wal_records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_flush_batches(&self) {
        self.flush_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_wal_swaps(&self) {
        self.wal_swaps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_empty_entries_skipped(&self) {
        self.empty_entries_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_submissions_rejected(&self) {
        self.submissions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commit_state_regressions(&self) {
        self.commit_state_regressions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_checkpoints(&self) {
        self.checkpoints_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_entries_replayed(&self, count: u64) {
        self.entries_replayed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_wal_files_purged(&self, count: u64) {
        self.wal_files_purged.fetch_add(count, Ordering::Relaxed);
    }

    pub fn wal_bytes(&self) -> u64 {
        self.wal_bytes_written.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            wal_bytes: self.wal_bytes_written.load(Ordering::Relaxed),
            wal_records: self.wal_records_written.load(Ordering::Relaxed),
            flush_batches: self.flush_batches.load(Ordering::Relaxed),
            wal_swaps: self.wal_swaps.load(Ordering::Relaxed),
            empty_entries_skipped: self.empty_entries_skipped.load(Ordering::Relaxed),
            submissions_rejected: self.submissions_rejected.load(Ordering::Relaxed),
            commit_state_regressions: self.commit_state_regressions.load(Ordering::Relaxed),
            checkpoints: self.checkpoints_created.load(Ordering::Relaxed),
            entries_replayed: self.entries_replayed.load(Ordering::Relaxed),
            wal_files_purged: self.wal_files_purged.load(Ordering::Relaxed),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_default()
    }
}

/// A point-in-time copy of every counter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub wal_bytes: u64,
    pub wal_records: u64,
    pub flush_batches: u64,
    pub wal_swaps: u64,
    pub empty_entries_skipped: u64,
    pub submissions_rejected: u64,
    pub commit_state_regressions: u64,
    pub checkpoints: u64,
    pub entries_replayed: u64,
    pub wal_files_purged: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_registry_is_zeroed() {
        assert_eq!(MetricsRegistry::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_concurrent_increments_are_exact() {
        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let r = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        r.increment_wal_records();
                        r.add_wal_bytes(32);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snap = registry.snapshot();
        assert_eq!(snap.wal_records, 4000);
        assert_eq!(snap.wal_bytes, 128_000);
    }

    #[test]
    fn test_json_has_every_counter() {
        let registry = MetricsRegistry::new();
        registry.increment_wal_swaps();
        let parsed: serde_json::Value = serde_json::from_str(&registry.to_json()).unwrap();
        assert_eq!(parsed["wal_swaps"], 1);
        assert_eq!(parsed["entries_replayed"], 0);
    }
}
