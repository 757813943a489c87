//! WAL manager and its flush thread
//!
//! Committing transactions are queued by any number of producers and written
//! by one dedicated thread, which alone owns the active file. Per batch the
//! thread:
//!
//! 1. Checks every transaction is COMMITTING (anything else is fatal)
//! 2. Skips entries with no commands
//! 3. Rotates before a checkpoint entry, so it opens the new active file
//! 4. Serializes with size verification and appends
//! 5. Hands the bytes to replication when leading
//! 6. Advances `CommitState`
//!
//! then flushes per policy, waits for replicas when leading, passes the whole
//! batch to the finalizer pool and rotates if the active file has outgrown
//! the threshold.
//!
//! Fatal errors stop the thread and go to the [`FatalHandler`]; the default
//! handler logs FATAL and aborts the process.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use super::active::ActiveWalFile;
use super::entry::LogEntry;
use super::errors::{WalError, WalResult};
use super::finalizer::FinalizerPool;
use super::iterator::WalListIterator;
use super::queue::SubmissionQueue;
use super::txn::{CommitFinalizer, ReplicationSink, TransactionType, TxnState, WalTxn};
use crate::checkpoint::CheckpointState;
use crate::config::WalConfig;
use crate::crash_point::{maybe_crash, points};
use crate::observability::{Event, Logger, MetricsRegistry};
use crate::recovery::{self, RecoveryResult, ReplayCursor};

/// Called once, on the flush thread, with the error that stopped it.
pub type FatalHandler = Arc<dyn Fn(&WalError) + Send + Sync>;

fn abort_on_fatal(err: &WalError) {
    Logger::fatal(
        Event::WalFatal.as_str(),
        &[("code", err.code().code()), ("error", &err.to_string())],
    );
    std::process::abort();
}

/// Newest durable commit and the bytes appended since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitState {
    pub max_commit_ts: u64,
    pub wal_byte_size: u64,
}

enum FlushItem {
    Txn(Arc<dyn WalTxn>),
    Replicated {
        logs: Vec<Vec<u8>>,
        on_startup: bool,
        reply: Sender<WalResult<()>>,
    },
    Shutdown,
}

/// Optional collaborators of a [`WalManager`]
#[derive(Default)]
pub struct WalManagerOptions {
    /// Used only when the configured role is leader
    pub replication: Option<Arc<dyn ReplicationSink>>,
    pub fatal_handler: Option<FatalHandler>,
    pub metrics: Option<Arc<MetricsRegistry>>,
}

struct Shared {
    config: WalConfig,
    queue: SubmissionQueue<FlushItem>,
    running: AtomicBool,
    commit_state: Mutex<CommitState>,
    checkpoint: CheckpointState,
    metrics: Arc<MetricsRegistry>,
    replication: Option<Arc<dyn ReplicationSink>>,
    fatal_handler: FatalHandler,
    fatal_error: Mutex<Option<WalError>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    fn commit_state(&self) -> CommitState {
        *lock(&self.commit_state)
    }

    fn update_commit_state(&self, commit_ts: u64, wal_size: u64) -> bool {
        let mut state = lock(&self.commit_state);
        if commit_ts <= state.max_commit_ts || wal_size < state.wal_byte_size {
            let current = *state;
            drop(state);
            self.metrics.increment_commit_state_regressions();
            Logger::error(
                Event::WalCommitStateRegression.as_str(),
                &[
                    ("commit_ts", &commit_ts.to_string()),
                    ("wal_size", &wal_size.to_string()),
                    ("max_commit_ts", &current.max_commit_ts.to_string()),
                    ("current_wal_size", &current.wal_byte_size.to_string()),
                ],
            );
            return false;
        }
        state.max_commit_ts = commit_ts;
        state.wal_byte_size = wal_size;
        true
    }

    /// Bytes appended so far plus `added`; the counter moves only through
    /// accepted commit-state updates.
    fn size_after(&self, added: usize) -> u64 {
        self.commit_state().wal_byte_size + added as u64
    }

    fn leader_sink(&self) -> Option<&Arc<dyn ReplicationSink>> {
        if self.config.is_leader() {
            self.replication.as_ref()
        } else {
            None
        }
    }

    fn escalate(&self, err: WalError) {
        self.running.store(false, Ordering::Release);
        self.abandon_pending();
        (self.fatal_handler)(&err);
        *lock(&self.fatal_error) = Some(err);
    }

    /// Close the queue once no flush thread will drain it. Dropped replication
    /// requests wake their callers with a not-running error.
    fn abandon_pending(&self) {
        let pending = self.queue.close();
        let txns = pending
            .iter()
            .filter(|item| matches!(item, FlushItem::Txn(_)))
            .count();
        if txns > 0 {
            Logger::error(
                Event::WalPendingAbandoned.as_str(),
                &[
                    ("items", &pending.len().to_string()),
                    ("txns", &txns.to_string()),
                ],
            );
        }
    }
}

fn join_flush_thread(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        Logger::error(Event::WalFlushThreadPanicked.as_str(), &[]);
    }
}

pub struct WalManager {
    shared: Arc<Shared>,
    finalizer: Arc<dyn CommitFinalizer>,
    flush_thread: Mutex<Option<JoinHandle<()>>>,
}

impl WalManager {
    pub fn new(config: WalConfig, finalizer: Arc<dyn CommitFinalizer>) -> Self {
        Self::with_options(config, finalizer, WalManagerOptions::default())
    }

    pub fn with_options(
        config: WalConfig,
        finalizer: Arc<dyn CommitFinalizer>,
        options: WalManagerOptions,
    ) -> Self {
        let queue = SubmissionQueue::new(config.max_pending_txns);
        let shared = Shared {
            config,
            queue,
            running: AtomicBool::new(false),
            commit_state: Mutex::new(CommitState::default()),
            checkpoint: CheckpointState::new(),
            metrics: options.metrics.unwrap_or_default(),
            replication: options.replication,
            fatal_handler: options
                .fatal_handler
                .unwrap_or_else(|| Arc::new(abort_on_fatal) as FatalHandler),
            fatal_error: Mutex::new(None),
        };
        Self {
            shared: Arc::new(shared),
            finalizer,
            flush_thread: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &WalConfig {
        &self.shared.config
    }

    pub fn wal_dir(&self) -> &Path {
        &self.shared.config.wal_dir
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.shared.metrics
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Open the active file and start the flush thread. A second call while
    /// running is a no-op.
    pub fn start(&self) -> WalResult<()> {
        // start and stop run one at a time under the handle slot
        let mut flush_thread = lock(&self.flush_thread);
        if self.is_running() {
            return Ok(());
        }
        // left behind by a fatal error; it has already exited
        if let Some(stopped) = flush_thread.take() {
            join_flush_thread(stopped);
        }

        let active = ActiveWalFile::open(self.wal_dir(), self.shared.config.flush_policy)?;
        lock(&self.shared.commit_state).wal_byte_size = 0;

        let pool = FinalizerPool::new(
            self.shared.config.finalizer_workers,
            Arc::clone(&self.finalizer),
        );
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("wal-flush".to_string())
            .spawn(move || flush_loop(shared, active, pool))
            .map_err(|e| WalError::io("cannot spawn WAL flush thread", e))?;
        self.shared.queue.reopen();
        self.shared.running.store(true, Ordering::Release);
        *flush_thread = Some(handle);

        Logger::info(
            Event::WalManagerStart.as_str(),
            &[
                ("wal_dir", &self.wal_dir().display().to_string()),
                ("flush_policy", self.shared.config.flush_policy.as_str()),
            ],
        );
        Ok(())
    }

    /// Stop accepting work, let the flush thread drain what is queued and
    /// join it. Idempotent.
    ///
    /// Every batch accepted before the queue closes sits ahead of the
    /// shutdown marker and is written and finalized before the join returns.
    pub fn stop(&self) {
        let mut flush_thread = lock(&self.flush_thread);
        let was_running = self
            .shared
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if was_running {
            self.shared.queue.close_with(FlushItem::Shutdown);
        }
        if let Some(handle) = flush_thread.take() {
            join_flush_thread(handle);
            // empty unless the thread died before reaching the marker
            self.shared.abandon_pending();
        }
        if was_running {
            Logger::info(
                Event::WalManagerStop.as_str(),
                &[("max_commit_ts", &self.commit_state().max_commit_ts.to_string())],
            );
        }
    }

    /// Queue committing transactions for the flush thread. Never blocks: the
    /// whole batch is refused when the manager is stopped or the queue is
    /// full. An accepted batch is always written and finalized, even when
    /// `stop` runs concurrently.
    pub fn submit_txns(&self, txns: Vec<Arc<dyn WalTxn>>) -> WalResult<()> {
        if !self.is_running() {
            return Err(self.rejected(WalError::not_running(), txns.len()));
        }
        let count = txns.len();
        self.shared
            .queue
            .push_batch(txns.into_iter().map(FlushItem::Txn).collect())
            .map_err(|e| self.rejected(e, count))
    }

    fn rejected(&self, err: WalError, count: usize) -> WalError {
        self.shared.metrics.increment_submissions_rejected();
        Logger::warn(
            Event::WalSubmissionRejected.as_str(),
            &[("code", err.code().code()), ("txns", &count.to_string())],
        );
        err
    }

    /// Append log bytes shipped by the leader. On startup the local log is
    /// first rotated past everything it already holds. Blocks until the
    /// flush thread has written and flushed them.
    pub fn flush_log_by_replication(&self, logs: Vec<Vec<u8>>, on_startup: bool) -> WalResult<()> {
        if !self.is_running() {
            return Err(WalError::not_running());
        }
        let (reply, response) = mpsc::channel();
        self.shared.queue.push_batch(vec![FlushItem::Replicated {
            logs,
            on_startup,
            reply,
        }])?;
        response.recv().unwrap_or_else(|_| Err(WalError::not_running()))
    }

    pub fn commit_state(&self) -> CommitState {
        self.shared.commit_state()
    }

    /// Advance the commit state. Refused (logged, returns false) if the
    /// timestamp does not increase or the size shrinks.
    pub fn update_commit_state(&self, commit_ts: u64, wal_size: u64) -> bool {
        self.shared.update_commit_state(commit_ts, wal_size)
    }

    /// Cumulative bytes appended since start
    pub fn wal_size(&self) -> u64 {
        self.commit_state().wal_byte_size
    }

    /// Seed state from a finished replay: the checkpoint watermark and the
    /// newest commit already in the log.
    pub fn restore_from_replay(&self, cursor: &ReplayCursor, checkpoint_found: bool) {
        if checkpoint_found {
            self.set_last_checkpoint_ts(cursor.max_checkpoint_ts);
        }
        let mut state = lock(&self.shared.commit_state);
        state.max_commit_ts = state.max_commit_ts.max(cursor.last_commit_ts);
    }

    pub fn set_checkpointing(&self) -> bool {
        self.shared.checkpoint.gate().set_checkpointing()
    }

    pub fn unset_checkpoint(&self) -> bool {
        self.shared.checkpoint.gate().unset_checkpoint()
    }

    pub fn is_checkpointing(&self) -> bool {
        self.shared.checkpoint.gate().is_checkpointing()
    }

    /// Zero until a checkpoint is recorded
    pub fn last_checkpoint_ts(&self) -> u64 {
        self.shared.checkpoint.watermark().get()
    }

    pub fn has_checkpoint(&self) -> bool {
        self.shared.checkpoint.watermark().is_set()
    }

    pub fn set_last_checkpoint_ts(&self, ts: u64) -> bool {
        self.shared.checkpoint.watermark().set(ts)
    }

    pub fn last_ckp_wal_size(&self) -> u64 {
        self.shared.checkpoint.last_ckp_wal_size()
    }

    pub fn set_last_ckp_wal_size(&self, wal_size: u64) {
        self.shared.checkpoint.set_last_ckp_wal_size(wal_size)
    }

    /// The flush thread's fatal error, if it stopped on one
    pub fn fatal_error(&self) -> Option<WalError> {
        lock(&self.shared.fatal_error).clone()
    }

    /// The checkpoint entry and every newer entry, oldest first.
    pub fn collect_wal_entries(&self) -> RecoveryResult<Vec<LogEntry>> {
        recovery::collect_wal_entries(self.wal_dir())
    }

    /// Serialized entries a follower at `start_ts` is missing, oldest first.
    /// The checkpoint entry always leads so the follower can rebuild from it.
    pub fn diff_wal_entry_bytes(&self, start_ts: u64) -> RecoveryResult<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        for entry in self.collect_wal_entries()? {
            if entry.checkpoint_ts().is_some() || entry.commit_ts > start_ts {
                out.push(entry.serialize()?);
            }
        }
        Ok(out)
    }
}

impl Drop for WalManager {
    fn drop(&mut self) {
        self.stop();
    }
}

enum BatchOutcome {
    Continue,
    Shutdown,
}

fn flush_loop(shared: Arc<Shared>, mut active: ActiveWalFile, mut pool: FinalizerPool) {
    loop {
        let batch = shared.queue.dequeue_bulk();
        if batch.is_empty() {
            Logger::warn(Event::WalEmptyBatch.as_str(), &[]);
            continue;
        }
        match flush_batch(&shared, &mut active, &pool, batch) {
            Ok(BatchOutcome::Continue) => {}
            Ok(BatchOutcome::Shutdown) => break,
            Err(e) if e.is_fatal() => {
                shared.escalate(e);
                break;
            }
            Err(e) => {
                Logger::error(
                    Event::WalFlushBatch.as_str(),
                    &[("code", e.code().code()), ("error", &e.to_string())],
                );
            }
        }
    }
    pool.shutdown();
}

fn flush_batch(
    shared: &Shared,
    active: &mut ActiveWalFile,
    pool: &FinalizerPool,
    batch: Vec<FlushItem>,
) -> WalResult<BatchOutcome> {
    let mut to_finalize: Vec<Arc<dyn WalTxn>> = Vec::new();
    let mut appended = 0usize;
    let mut replicated = false;
    let mut shutdown = false;

    for item in batch {
        match item {
            FlushItem::Shutdown => shutdown = true,
            FlushItem::Txn(txn) => {
                if write_txn(shared, active, txn.as_ref())? {
                    appended += 1;
                }
                // read-only transactions are finalized without an entry
                to_finalize.push(txn);
            }
            FlushItem::Replicated {
                logs,
                on_startup,
                reply,
            } => {
                let result = write_replicated(shared, active, &logs, on_startup);
                replicated = true;
                let fatal = result.as_ref().err().filter(|e| e.is_fatal()).cloned();
                let _ = reply.send(result);
                if let Some(err) = fatal {
                    return Err(err);
                }
            }
        }
    }

    if appended > 0 || replicated {
        active.flush()?;
        maybe_crash(points::WAL_AFTER_FLUSH);
    }
    if appended > 0 {
        if let Some(sink) = shared.leader_sink() {
            sink.sync_logs();
        }
        shared.metrics.increment_flush_batches();
        Logger::trace(
            Event::WalFlushBatch.as_str(),
            &[
                ("txns", &appended.to_string()),
                ("max_commit_ts", &shared.commit_state().max_commit_ts.to_string()),
            ],
        );
    }
    for txn in to_finalize {
        pool.submit(txn);
    }

    if active.len() > shared.config.wal_size_threshold {
        let max_commit_ts = shared.commit_state().max_commit_ts;
        match active.swap(max_commit_ts, true) {
            Ok(true) => {
                shared.metrics.increment_wal_swaps();
                Logger::info(
                    Event::WalSizeThresholdSwap.as_str(),
                    &[("max_commit_ts", &max_commit_ts.to_string())],
                );
            }
            Ok(false) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => Logger::error(
                Event::WalSwapFailed.as_str(),
                &[("code", e.code().code()), ("error", &e.to_string())],
            ),
        }
    }

    Ok(if shutdown {
        BatchOutcome::Shutdown
    } else {
        BatchOutcome::Continue
    })
}

/// Returns whether an entry was appended. A transaction with no commands
/// passes the state check but writes nothing.
fn write_txn(shared: &Shared, active: &mut ActiveWalFile, txn: &dyn WalTxn) -> WalResult<bool> {
    let state = txn.state();
    if state != TxnState::Committing {
        return Err(WalError::protocol_violation(format!(
            "transaction {} reached the WAL in state {}",
            txn.txn_id(),
            state
        )));
    }
    let entry = txn.wal_entry();
    if entry.is_empty() {
        shared.metrics.increment_empty_entries_skipped();
        Logger::trace(
            Event::WalSkipEmptyEntry.as_str(),
            &[("txn_id", &txn.txn_id().to_string())],
        );
        return Ok(false);
    }

    if txn.txn_type() == TransactionType::Checkpoint {
        let max_commit_ts = shared.commit_state().max_commit_ts;
        match active.swap(max_commit_ts, true) {
            Ok(true) => shared.metrics.increment_wal_swaps(),
            Ok(false) => {}
            Err(e) if e.is_fatal() => return Err(e),
            // replay finds a checkpoint anywhere in a file
            Err(e) => Logger::error(
                Event::WalSwapFailed.as_str(),
                &[("code", e.code().code()), ("error", &e.to_string())],
            ),
        }
    }

    let bytes = entry.serialize()?;
    active.append(&bytes)?;
    shared.metrics.add_wal_bytes(bytes.len() as u64);
    shared.metrics.increment_wal_records();

    let wal_size = shared.size_after(bytes.len());
    if let Some(sink) = shared.leader_sink() {
        sink.prepare_logs(Arc::from(bytes));
    }
    shared.update_commit_state(entry.commit_ts, wal_size);
    Ok(true)
}

fn write_replicated(
    shared: &Shared,
    active: &mut ActiveWalFile,
    logs: &[Vec<u8>],
    on_startup: bool,
) -> WalResult<()> {
    if on_startup {
        let max_commit_ts = max_commit_ts_on_disk(shared.config.wal_dir.as_path())?;
        if active.swap(max_commit_ts, false)? {
            shared.metrics.increment_wal_swaps();
        }
    }

    let mut max_commit_ts = 0;
    for log in logs {
        let (entry, used) = LogEntry::read(log)
            .map_err(|e| WalError::corruption(format!("replicated log entry: {}", e)))?;
        if used != log.len() {
            return Err(WalError::size_mismatch(log.len(), used));
        }
        active.append(log)?;
        shared.metrics.add_wal_bytes(log.len() as u64);
        shared.metrics.increment_wal_records();
        let wal_size = shared.size_after(log.len());
        shared.update_commit_state(entry.commit_ts, wal_size);
        max_commit_ts = max_commit_ts.max(entry.commit_ts);
    }
    active.flush()?;

    Logger::info(
        Event::WalReplicatedLogsApplied.as_str(),
        &[
            ("entries", &logs.len().to_string()),
            ("on_startup", &on_startup.to_string()),
            ("max_commit_ts", &max_commit_ts.to_string()),
        ],
    );
    Ok(())
}

fn max_commit_ts_on_disk(dir: &Path) -> WalResult<u64> {
    let mut max_commit_ts = 0;
    for entry in WalListIterator::from_dir(dir)? {
        max_commit_ts = max_commit_ts.max(entry?.commit_ts);
    }
    Ok(max_commit_ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::command::Command;
    use tempfile::TempDir;

    struct NoopFinalizer;

    impl CommitFinalizer for NoopFinalizer {
        fn finalize(&self, _txn: Arc<dyn WalTxn>) {}
    }

    /// Its state cannot be read; the flush thread panics on it.
    struct PanickingTxn(LogEntry);

    impl WalTxn for PanickingTxn {
        fn txn_id(&self) -> u64 {
            self.0.txn_id
        }
        fn begin_ts(&self) -> u64 {
            self.0.commit_ts
        }
        fn commit_ts(&self) -> u64 {
            self.0.commit_ts
        }
        fn state(&self) -> TxnState {
            panic!("transaction state unavailable")
        }
        fn txn_type(&self) -> TransactionType {
            TransactionType::Normal
        }
        fn wal_entry(&self) -> &LogEntry {
            &self.0
        }
    }

    fn manager(dir: &Path) -> WalManager {
        let config = WalConfig::new(dir.join("wal"), dir.join("data"));
        WalManager::new(config, Arc::new(NoopFinalizer))
    }

    #[test]
    fn test_commit_state_rejects_regressions() {
        let dir = TempDir::new().unwrap();
        let wal = manager(dir.path());
        assert!(wal.update_commit_state(5, 100));
        assert!(!wal.update_commit_state(5, 200));
        assert!(!wal.update_commit_state(4, 300));
        assert!(!wal.update_commit_state(6, 99));
        // equal size with a newer timestamp is accepted
        assert!(wal.update_commit_state(6, 100));
        assert_eq!(
            wal.commit_state(),
            CommitState {
                max_commit_ts: 6,
                wal_byte_size: 100
            }
        );
        assert_eq!(wal.metrics().snapshot().commit_state_regressions, 3);
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let wal = manager(dir.path());
        wal.start().unwrap();
        wal.start().unwrap();
        assert!(wal.is_running());
        wal.stop();
        wal.stop();
        assert!(!wal.is_running());
        assert!(wal.fatal_error().is_none());
    }

    #[test]
    fn test_submit_to_stopped_manager_is_refused() {
        let dir = TempDir::new().unwrap();
        let wal = manager(dir.path());
        let err = wal.submit_txns(Vec::new()).unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(wal.metrics().snapshot().submissions_rejected, 1);
        assert!(wal.flush_log_by_replication(Vec::new(), false).is_err());
    }

    #[test]
    fn test_checkpoint_bookkeeping_delegates() {
        let dir = TempDir::new().unwrap();
        let wal = manager(dir.path());
        assert!(!wal.has_checkpoint());
        assert_eq!(wal.last_checkpoint_ts(), 0);
        assert!(wal.set_last_checkpoint_ts(9));
        assert!(!wal.set_last_checkpoint_ts(3));
        assert_eq!(wal.last_checkpoint_ts(), 9);

        assert!(wal.set_checkpointing());
        assert!(wal.is_checkpointing());
        assert!(!wal.set_checkpointing());
        assert!(wal.unset_checkpoint());

        wal.set_last_ckp_wal_size(512);
        assert_eq!(wal.last_ckp_wal_size(), 512);
    }

    #[test]
    fn test_restore_from_replay() {
        let dir = TempDir::new().unwrap();
        let wal = manager(dir.path());
        let cursor = ReplayCursor {
            max_txn_id: 11,
            last_commit_ts: 11,
            max_checkpoint_ts: 7,
        };
        wal.restore_from_replay(&cursor, true);
        assert_eq!(wal.last_checkpoint_ts(), 7);
        assert_eq!(wal.commit_state().max_commit_ts, 11);
        assert!(!wal.update_commit_state(11, 0));
    }

    #[test]
    fn test_replicated_logs_are_validated() {
        let dir = TempDir::new().unwrap();
        let wal = manager(dir.path());
        wal.start().unwrap();

        let entry = LogEntry::new(
            1,
            4,
            vec![Command::DropDatabase {
                db_name: "db".into(),
            }],
        );
        let bytes = entry.serialize().unwrap();
        wal.flush_log_by_replication(vec![bytes.clone()], true).unwrap();
        assert_eq!(wal.commit_state().max_commit_ts, 4);
        assert_eq!(wal.wal_size(), bytes.len() as u64);
        wal.stop();
    }

    #[test]
    fn test_panicked_flush_thread_is_joined() {
        let dir = TempDir::new().unwrap();
        let wal = manager(dir.path());
        wal.start().unwrap();
        wal.submit_txns(vec![Arc::new(PanickingTxn(LogEntry::new(1, 1, vec![])))])
            .unwrap();
        wal.stop();
        assert!(!wal.is_running());
        assert!(wal.fatal_error().is_none());

        // a restart gets a live flush thread and an empty queue
        wal.start().unwrap();
        let bytes = LogEntry::new(
            2,
            2,
            vec![Command::DropDatabase {
                db_name: "db".into(),
            }],
        )
        .serialize()
        .unwrap();
        wal.flush_log_by_replication(vec![bytes], false).unwrap();
        assert_eq!(wal.commit_state().max_commit_ts, 2);
        wal.stop();
    }
}
