//! Shared helpers for integration tests
//!
//! Minimal stand-ins for the transaction layer: a committing transaction
//! that carries a log entry, a finalizer that records what it saw and a
//! transaction manager that commits checkpoints through a running
//! [`WalManager`].

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use aerowal::bg_task::{BgTaskInfo, CheckpointTxn, FlushedArtifact, TaskError, TaskHistory, TaskResult, TxnManager};
use aerowal::config::WalConfig;
use aerowal::wal::{
    CommitFinalizer, Command, LogEntry, RowBatch, TransactionType, TxnState, WalListIterator,
    WalManager, WalTxn,
};

pub const WAIT: Duration = Duration::from_secs(10);

pub fn test_config(root: &Path) -> WalConfig {
    let mut config = WalConfig::new(root.join("wal"), root.join("data"));
    config.finalizer_workers = 2;
    config
}

// =============================================================================
// Transactions
// =============================================================================

pub struct TestTxn {
    entry: LogEntry,
    state: TxnState,
    txn_type: TransactionType,
}

impl TestTxn {
    pub fn committing(txn_id: u64, commit_ts: u64, commands: Vec<Command>) -> Arc<dyn WalTxn> {
        Arc::new(Self {
            entry: LogEntry::new(txn_id, commit_ts, commands),
            state: TxnState::Committing,
            txn_type: TransactionType::Normal,
        })
    }

    pub fn in_state(txn_id: u64, commit_ts: u64, state: TxnState) -> Arc<dyn WalTxn> {
        Arc::new(Self {
            entry: LogEntry::new(txn_id, commit_ts, vec![create_db(&format!("db{}", txn_id))]),
            state,
            txn_type: TransactionType::Normal,
        })
    }

    pub fn checkpoint(txn_id: u64, commit_ts: u64, max_commit_ts: u64) -> Arc<dyn WalTxn> {
        Arc::new(Self {
            entry: LogEntry::new(
                txn_id,
                commit_ts,
                vec![Command::Checkpoint {
                    max_commit_ts,
                    catalog_path: format!("catalog/full.{}.json", max_commit_ts),
                }],
            ),
            state: TxnState::Committing,
            txn_type: TransactionType::Checkpoint,
        })
    }
}

impl WalTxn for TestTxn {
    fn txn_id(&self) -> u64 {
        self.entry.txn_id
    }
    fn begin_ts(&self) -> u64 {
        self.entry.commit_ts.saturating_sub(1)
    }
    fn commit_ts(&self) -> u64 {
        self.entry.commit_ts
    }
    fn state(&self) -> TxnState {
        self.state
    }
    fn txn_type(&self) -> TransactionType {
        self.txn_type
    }
    fn wal_entry(&self) -> &LogEntry {
        &self.entry
    }
}

pub fn create_db(name: &str) -> Command {
    Command::CreateDatabase {
        db_name: name.to_string(),
        db_dir_tail: format!("{}_dir", name),
        comment: String::new(),
    }
}

pub fn append_rows(db: &str, table: &str, row_count: u32) -> Command {
    Command::Append {
        db_name: db.to_string(),
        table_name: table.to_string(),
        rows: RowBatch {
            row_count,
            columns: vec![],
        },
    }
}

// =============================================================================
// Finalization
// =============================================================================

#[derive(Default)]
pub struct RecordingFinalizer {
    finalized: Mutex<Vec<u64>>,
    changed: Condvar,
}

impl RecordingFinalizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Txn ids in the order finalization happened
    pub fn finalized(&self) -> Vec<u64> {
        self.finalized.lock().unwrap().clone()
    }

    pub fn wait_for_count(&self, count: usize) -> bool {
        let deadline = Instant::now() + WAIT;
        let mut done = self.finalized.lock().unwrap();
        while done.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            done = self.changed.wait_timeout(done, deadline - now).unwrap().0;
        }
        true
    }

    pub fn wait_for_txn(&self, txn_id: u64) -> bool {
        let deadline = Instant::now() + WAIT;
        let mut done = self.finalized.lock().unwrap();
        while !done.contains(&txn_id) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            done = self.changed.wait_timeout(done, deadline - now).unwrap().0;
        }
        true
    }
}

impl CommitFinalizer for RecordingFinalizer {
    fn finalize(&self, txn: Arc<dyn WalTxn>) {
        self.finalized.lock().unwrap().push(txn.txn_id());
        self.changed.notify_all();
    }
}

// =============================================================================
// Checkpoint transactions
// =============================================================================

pub struct TestCheckpointTxn {
    txn_id: u64,
    commit_ts: u64,
    durable_ts: u64,
    wal_size: Mutex<u64>,
    max_commit_ts: Mutex<u64>,
    fail: bool,
}

impl TestCheckpointTxn {
    pub fn wal_size(&self) -> u64 {
        *self.wal_size.lock().unwrap()
    }
}

impl CheckpointTxn for TestCheckpointTxn {
    fn txn_id(&self) -> u64 {
        self.txn_id
    }
    fn commit_ts(&self) -> u64 {
        self.commit_ts
    }
    fn set_wal_size(&self, wal_size: u64) {
        *self.wal_size.lock().unwrap() = wal_size;
    }
    fn checkpoint(&self, _last_checkpoint_ts: u64) -> TaskResult<()> {
        if self.fail {
            return Err(TaskError::Txn("snapshot failed".into()));
        }
        *self.max_commit_ts.lock().unwrap() = self.durable_ts;
        Ok(())
    }
    fn checkpoint_max_commit_ts(&self) -> u64 {
        *self.max_commit_ts.lock().unwrap()
    }
    fn flushed_artifacts(&self) -> Vec<FlushedArtifact> {
        vec![FlushedArtifact {
            db_id: "0".into(),
            table_id: "0".into(),
            segment_id: 0,
            block_id: 0,
            to_flush: "all".into(),
        }]
    }
}

/// Commits checkpoint transactions through a running WAL manager and waits
/// for them to be finalized.
pub struct TestTxnManager {
    wal: Arc<WalManager>,
    finalizer: Arc<RecordingFinalizer>,
    next_txn_id: AtomicU64,
    pub history: TaskHistory,
    pub cleanup_result: Mutex<u64>,
    pub fail_checkpoint: bool,
}

impl TestTxnManager {
    pub fn new(wal: Arc<WalManager>, finalizer: Arc<RecordingFinalizer>) -> Arc<Self> {
        Arc::new(Self {
            wal,
            finalizer,
            next_txn_id: AtomicU64::new(1000),
            history: TaskHistory::new(16),
            cleanup_result: Mutex::new(0),
            fail_checkpoint: false,
        })
    }

    pub fn failing(wal: Arc<WalManager>, finalizer: Arc<RecordingFinalizer>) -> Arc<Self> {
        Arc::new(Self {
            wal,
            finalizer,
            next_txn_id: AtomicU64::new(1000),
            history: TaskHistory::new(16),
            cleanup_result: Mutex::new(0),
            fail_checkpoint: true,
        })
    }
}

impl TxnManager for TestTxnManager {
    fn begin_checkpoint_txn(&self) -> TaskResult<Arc<dyn CheckpointTxn>> {
        let durable_ts = self.wal.commit_state().max_commit_ts;
        Ok(Arc::new(TestCheckpointTxn {
            txn_id: self.next_txn_id.fetch_add(1, Ordering::SeqCst),
            commit_ts: durable_ts + 1,
            durable_ts,
            wal_size: Mutex::new(0),
            max_commit_ts: Mutex::new(0),
            fail: self.fail_checkpoint,
        }))
    }

    fn commit_checkpoint_txn(&self, txn: &Arc<dyn CheckpointTxn>) -> TaskResult<()> {
        let wal_txn =
            TestTxn::checkpoint(txn.txn_id(), txn.commit_ts(), txn.checkpoint_max_commit_ts());
        self.wal.submit_txns(vec![wal_txn])?;
        if !self.finalizer.wait_for_txn(txn.txn_id()) {
            return Err(TaskError::Txn("checkpoint txn was not finalized".into()));
        }
        Ok(())
    }

    fn cleanup(&self, _last_cleanup_ts: u64) -> TaskResult<u64> {
        Ok(*self.cleanup_result.lock().unwrap())
    }

    fn add_task_info(&self, info: BgTaskInfo) {
        self.history.add(info);
    }
}

// =============================================================================
// Log inspection
// =============================================================================

/// Every entry in the directory, oldest first
pub fn read_log(dir: &Path) -> Vec<LogEntry> {
    let mut entries: Vec<LogEntry> = WalListIterator::from_dir(dir)
        .unwrap()
        .map(|e| e.unwrap())
        .collect();
    entries.reverse();
    entries
}
