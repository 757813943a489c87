//! Checkpoint coordination
//!
//! A checkpoint runs as its own transaction:
//!
//! 1. Claim the single-flight gate (fail fast if held)
//! 2. Snapshot the current WAL size
//! 3. Ask the transaction layer to materialize state since the last watermark
//! 4. Commit; the flush thread rotates the active file and writes the
//!    checkpoint entry as the first record of the new one
//! 5. Advance the watermark and the last-checkpoint WAL size
//! 6. Release the gate
//!
//! A failure at any step leaves the previous watermark in place.

use std::sync::Arc;

use super::errors::{CheckpointError, CheckpointResult};
use super::policy::CheckpointPolicy;
use crate::bg_task::{CheckpointOutcome, CheckpointTask, TxnManager};
use crate::crash_point::{maybe_crash, points};
use crate::observability::{Event, Logger, ObservationScope};
use crate::wal::WalManager;

pub struct CheckpointCoordinator {
    wal: Arc<WalManager>,
    txn_mgr: Arc<dyn TxnManager>,
    policy: CheckpointPolicy,
}

impl CheckpointCoordinator {
    pub fn new(wal: Arc<WalManager>, txn_mgr: Arc<dyn TxnManager>) -> Self {
        let policy = CheckpointPolicy::new(wal.config().checkpoint_interval_bytes);
        Self {
            wal,
            txn_mgr,
            policy,
        }
    }

    pub fn policy(&self) -> CheckpointPolicy {
        self.policy
    }

    pub fn should_checkpoint(&self) -> bool {
        self.policy
            .should_checkpoint(self.wal.wal_size(), self.wal.last_ckp_wal_size())
    }

    /// Checkpoint only if enough log has accumulated since the last one.
    pub fn maybe_checkpoint(&self) -> CheckpointResult<Option<CheckpointOutcome>> {
        if !self.should_checkpoint() {
            return Ok(None);
        }
        self.checkpoint().map(Some)
    }

    pub fn checkpoint(&self) -> CheckpointResult<CheckpointOutcome> {
        if !self.wal.set_checkpointing() {
            Logger::info(Event::CheckpointSkipped.as_str(), &[("reason", "in_progress")]);
            return Err(CheckpointError::in_progress());
        }
        let result = self.run_exclusive();
        self.wal.unset_checkpoint();
        result
    }

    fn run_exclusive(&self) -> CheckpointResult<CheckpointOutcome> {
        let wal_size = self.wal.wal_size();
        let last_ts = self.wal.last_checkpoint_ts().to_string();
        let wal_size_str = wal_size.to_string();
        let fields = [("last_checkpoint_ts", last_ts.as_str()), ("wal_size", wal_size_str.as_str())];
        Logger::info(Event::CheckpointStart.as_str(), &fields);
        let scope = ObservationScope::with_fields("CHECKPOINT_TXN", &fields);

        let outcome = match CheckpointTask::new(wal_size).execute_with_new_txn(&*self.txn_mgr, &self.wal) {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = CheckpointError::from(e);
                scope.fail(&err.to_string());
                Logger::error(Event::CheckpointFailed.as_str(), &[("error", &err.to_string())]);
                return Err(err);
            }
        };

        maybe_crash(points::CHECKPOINT_BEFORE_WATERMARK);
        if !self.wal.set_last_checkpoint_ts(outcome.max_commit_ts) {
            Logger::warn(
                Event::CheckpointFailed.as_str(),
                &[
                    ("reason", "watermark not advanced"),
                    ("max_commit_ts", &outcome.max_commit_ts.to_string()),
                    ("last_checkpoint_ts", &last_ts),
                ],
            );
        }
        self.wal.set_last_ckp_wal_size(wal_size);
        self.wal.metrics().increment_checkpoints();

        scope.complete_with_fields(&[
            ("txn_id", &outcome.txn_id.to_string()),
            ("max_commit_ts", &outcome.max_commit_ts.to_string()),
            ("artifacts", &outcome.artifacts.to_string()),
        ]);
        Logger::info(
            Event::CheckpointComplete.as_str(),
            &[
                ("commit_ts", &outcome.commit_ts.to_string()),
                ("max_commit_ts", &outcome.max_commit_ts.to_string()),
            ],
        );
        Ok(outcome)
    }
}
