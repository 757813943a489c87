//! Checkpoint bookkeeping shared with the WAL manager
//!
//! The gate is lock-free. The watermark and the WAL size recorded at the last
//! checkpoint each sit behind their own mutex, held only for the read or the
//! update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Single-flight guard: at most one checkpoint runs at a time.
#[derive(Debug, Default)]
pub struct CheckpointGate {
    checkpointing: AtomicBool,
}

impl CheckpointGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate. Returns false if a checkpoint already holds it.
    pub fn set_checkpointing(&self) -> bool {
        self.checkpointing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the gate. Returns false if it was not held.
    pub fn unset_checkpoint(&self) -> bool {
        self.checkpointing
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_checkpointing(&self) -> bool {
        self.checkpointing.load(Ordering::Acquire)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Highest commit timestamp covered by a completed checkpoint
#[derive(Debug, Default)]
pub struct CheckpointWatermark {
    ts: Mutex<Option<u64>>,
}

impl CheckpointWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero until the first checkpoint is recorded.
    pub fn get(&self) -> u64 {
        lock(&self.ts).unwrap_or(0)
    }

    pub fn is_set(&self) -> bool {
        lock(&self.ts).is_some()
    }

    /// Accept `ts` only if nothing is recorded yet or it is strictly newer.
    pub fn set(&self, ts: u64) -> bool {
        let mut cur = lock(&self.ts);
        match *cur {
            Some(existing) if ts <= existing => false,
            _ => {
                *cur = Some(ts);
                true
            }
        }
    }
}

/// All checkpoint state owned by one WAL manager
#[derive(Debug, Default)]
pub struct CheckpointState {
    gate: CheckpointGate,
    watermark: CheckpointWatermark,
    last_ckp_wal_size: Mutex<u64>,
}

impl CheckpointState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate(&self) -> &CheckpointGate {
        &self.gate
    }

    pub fn watermark(&self) -> &CheckpointWatermark {
        &self.watermark
    }

    pub fn last_ckp_wal_size(&self) -> u64 {
        *lock(&self.last_ckp_wal_size)
    }

    pub fn set_last_ckp_wal_size(&self, wal_size: u64) {
        *lock(&self.last_ckp_wal_size) = wal_size;
    }
}
