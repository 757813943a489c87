//! Checkpoint protocol tests
//!
//! - At most one checkpoint runs at a time
//! - The watermark only moves forward
//! - A committed checkpoint opens a fresh active file with its entry first
//! - A failed checkpoint releases the gate and keeps the old watermark

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use aerowal::bg_task::{BgTaskType, TxnManager};
use aerowal::checkpoint::{CheckpointCoordinator, CheckpointErrorCode, CheckpointWatermark};
use aerowal::wal::{active_path, rotated_path, LogEntry, WalEntryIterator, WalManager};
use tempfile::TempDir;

use common::{
    append_rows, create_db, read_log, test_config, RecordingFinalizer, TestTxn, TestTxnManager,
};

fn running(temp: &TempDir) -> (Arc<WalManager>, Arc<RecordingFinalizer>) {
    let finalizer = RecordingFinalizer::new();
    let wal = Arc::new(WalManager::new(test_config(temp.path()), finalizer.clone()));
    wal.start().unwrap();
    (wal, finalizer)
}

fn commit_some(wal: &WalManager, finalizer: &RecordingFinalizer, first_ts: u64, count: u64) {
    let txns = (first_ts..first_ts + count)
        .map(|ts| TestTxn::committing(ts, ts, vec![append_rows("db", "t", 4)]))
        .collect();
    wal.submit_txns(txns).unwrap();
    assert!(finalizer.wait_for_txn(first_ts + count - 1));
}

#[test]
fn test_concurrent_set_checkpointing_single_winner() {
    let temp = TempDir::new().unwrap();
    let finalizer = RecordingFinalizer::new();
    let wal = Arc::new(WalManager::new(test_config(temp.path()), finalizer));

    for _ in 0..50 {
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let wal = wal.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    wal.set_checkpointing()
                })
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);

        // the loser keeps failing until the winner releases
        assert!(!wal.set_checkpointing());
        assert!(wal.unset_checkpoint());
        assert!(!wal.is_checkpointing());
    }
}

#[test]
fn test_watermark_is_monotonic_under_contention() {
    let watermark = Arc::new(CheckpointWatermark::new());
    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let watermark = watermark.clone();
            thread::spawn(move || {
                for i in 0..200u64 {
                    let ts = i * 8 + t;
                    let before = watermark.get();
                    watermark.set(ts);
                    assert!(watermark.get() >= before);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(watermark.get(), 199 * 8 + 7);
    assert!(!watermark.set(5));
}

#[test]
fn test_checkpoint_rotates_and_advances_watermark() {
    let temp = TempDir::new().unwrap();
    let (wal, finalizer) = running(&temp);
    commit_some(&wal, &finalizer, 1, 3);

    let txn_mgr = TestTxnManager::new(wal.clone(), finalizer.clone());
    let coordinator = CheckpointCoordinator::new(wal.clone(), txn_mgr.clone());
    let outcome = coordinator.checkpoint().unwrap();

    assert_eq!(outcome.max_commit_ts, 3);
    assert_eq!(outcome.commit_ts, 4);
    assert_eq!(outcome.artifacts, 1);
    assert_eq!(wal.last_checkpoint_ts(), 3);
    assert!(wal.has_checkpoint());
    assert!(!wal.is_checkpointing());
    assert_eq!(wal.metrics().snapshot().checkpoints, 1);

    // the pre-checkpoint log was rotated under ts 3
    let wal_dir = wal.wal_dir().to_path_buf();
    assert!(rotated_path(&wal_dir, 3).exists());
    let first_active: Vec<LogEntry> = WalEntryIterator::open(&active_path(&wal_dir))
        .unwrap()
        .map(|e| e.unwrap())
        .collect();
    assert_eq!(first_active.len(), 1);
    assert_eq!(first_active[0].checkpoint_ts(), Some(3));
    assert_eq!(first_active[0].commit_ts, 4);

    let history = txn_mgr.history.list();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].task_type, BgTaskType::Checkpoint);
    assert_eq!(history[0].status_list, vec!["OK".to_string()]);

    // later commits land after the checkpoint
    commit_some(&wal, &finalizer, 5, 2);
    wal.stop();
    let ts: Vec<u64> = read_log(&wal_dir).iter().map(|e| e.commit_ts).collect();
    assert_eq!(ts, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_failed_checkpoint_releases_gate() {
    let temp = TempDir::new().unwrap();
    let (wal, finalizer) = running(&temp);
    commit_some(&wal, &finalizer, 1, 2);

    let failing = CheckpointCoordinator::new(
        wal.clone(),
        TestTxnManager::failing(wal.clone(), finalizer.clone()),
    );
    let err = failing.checkpoint().unwrap_err();
    assert_eq!(err.code(), CheckpointErrorCode::AeroCheckpointTxnFailed);
    assert!(!wal.is_checkpointing());
    assert!(!wal.has_checkpoint());
    assert_eq!(wal.last_checkpoint_ts(), 0);

    let coordinator = CheckpointCoordinator::new(
        wal.clone(),
        TestTxnManager::new(wal.clone(), finalizer.clone()),
    );
    let outcome = coordinator.checkpoint().unwrap();
    assert_eq!(outcome.max_commit_ts, 2);
    assert_eq!(wal.last_checkpoint_ts(), 2);
    wal.stop();
}

#[test]
fn test_checkpoint_in_progress_fails_fast() {
    let temp = TempDir::new().unwrap();
    let (wal, finalizer) = running(&temp);
    let txn_mgr: Arc<dyn TxnManager> = TestTxnManager::new(wal.clone(), finalizer);
    let coordinator = CheckpointCoordinator::new(wal.clone(), txn_mgr);

    assert!(wal.set_checkpointing());
    let err = coordinator.checkpoint().unwrap_err();
    assert_eq!(err.code(), CheckpointErrorCode::AeroCheckpointInProgress);
    // the holder still owns the gate
    assert!(wal.is_checkpointing());
    assert!(wal.unset_checkpoint());
    wal.stop();
}

#[test]
fn test_maybe_checkpoint_waits_for_log_growth() {
    let temp = TempDir::new().unwrap();
    let finalizer = RecordingFinalizer::new();
    let mut config = test_config(temp.path());
    config.checkpoint_interval_bytes = 1 << 20;
    let wal = Arc::new(WalManager::new(config, finalizer.clone()));
    wal.start().unwrap();
    commit_some(&wal, &finalizer, 1, 2);

    let coordinator = CheckpointCoordinator::new(
        wal.clone(),
        TestTxnManager::new(wal.clone(), finalizer.clone()),
    );
    assert!(!coordinator.should_checkpoint());
    assert!(coordinator.maybe_checkpoint().unwrap().is_none());
    assert!(!wal.has_checkpoint());
    wal.stop();
}

#[test]
fn test_diff_entries_lead_with_checkpoint() {
    let temp = TempDir::new().unwrap();
    let (wal, finalizer) = running(&temp);
    commit_some(&wal, &finalizer, 1, 3);
    let coordinator = CheckpointCoordinator::new(
        wal.clone(),
        TestTxnManager::new(wal.clone(), finalizer.clone()),
    );
    coordinator.checkpoint().unwrap();
    wal.submit_txns(vec![
        TestTxn::committing(5, 5, vec![create_db("five")]),
        TestTxn::committing(6, 6, vec![create_db("six")]),
    ])
    .unwrap();
    assert!(finalizer.wait_for_txn(6));

    let decode = |bytes: &Vec<u8>| LogEntry::read(bytes).unwrap().0.commit_ts;
    let diff = wal.diff_wal_entry_bytes(5).unwrap();
    let ts: Vec<u64> = diff.iter().map(decode).collect();
    assert_eq!(ts, vec![4, 6]);

    let all: Vec<u64> = wal.diff_wal_entry_bytes(0).unwrap().iter().map(decode).collect();
    assert_eq!(all, vec![4, 5, 6]);
    wal.stop();
}
