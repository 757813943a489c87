//! Background task envelope and the concrete tasks
//!
//! The WAL layer only schedules these and records their outcome. What a
//! compaction or an index dump actually does lives in the storage layer.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::errors::{TaskError, TaskResult};
use super::info::BgTaskInfo;
use super::txn::{CheckpointTxn, TxnManager};
use crate::observability::{Event, Logger};
use crate::wal::{purge_obsolete_wal_files, WalManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BgTaskType {
    Checkpoint,
    Cleanup,
    Compact,
    DumpIndex,
    AppendMemIndex,
    TestCommand,
}

impl BgTaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BgTaskType::Checkpoint => "checkpoint",
            BgTaskType::Cleanup => "cleanup",
            BgTaskType::Compact => "compact",
            BgTaskType::DumpIndex => "dump_index",
            BgTaskType::AppendMemIndex => "append_mem_index",
            BgTaskType::TestCommand => "test_command",
        }
    }
}

impl fmt::Display for BgTaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a checkpoint committed in its own transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointOutcome {
    pub txn_id: u64,
    pub commit_ts: u64,
    /// Watermark recorded by the checkpoint entry
    pub max_commit_ts: u64,
    pub artifacts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointTask {
    wal_size: u64,
    needs_new_txn: bool,
}

impl CheckpointTask {
    /// Checkpoint that begins and commits its own transaction.
    pub fn new(wal_size: u64) -> Self {
        Self {
            wal_size,
            needs_new_txn: true,
        }
    }

    /// Checkpoint staged inside a transaction the caller commits.
    pub fn within_txn(wal_size: u64) -> Self {
        Self {
            wal_size,
            needs_new_txn: false,
        }
    }

    pub fn wal_size(&self) -> u64 {
        self.wal_size
    }

    pub fn execute_within_txn(&self, txn: &dyn CheckpointTxn, wal: &WalManager) -> TaskResult<()> {
        let last_checkpoint_ts = wal.last_checkpoint_ts();
        let result = txn.checkpoint(last_checkpoint_ts);
        txn.set_wal_size(self.wal_size);
        result
    }

    pub fn execute_with_new_txn(
        &self,
        txn_mgr: &dyn TxnManager,
        wal: &WalManager,
    ) -> TaskResult<CheckpointOutcome> {
        let txn: Arc<dyn CheckpointTxn> = txn_mgr.begin_checkpoint_txn()?;
        txn.set_wal_size(self.wal_size);
        txn.checkpoint(wal.last_checkpoint_ts())?;
        txn_mgr.commit_checkpoint_txn(&txn)?;

        let artifacts = txn.flushed_artifacts();
        let mut info = BgTaskInfo::new(BgTaskType::Checkpoint);
        for artifact in &artifacts {
            info.push(
                format!(
                    "Txn: {}, commit: {}, checkpoint data: {}.{}.{}.{} {}",
                    txn.txn_id(),
                    txn.commit_ts(),
                    artifact.db_id,
                    artifact.table_id,
                    artifact.segment_id,
                    artifact.block_id,
                    artifact.to_flush
                ),
                "OK",
            );
        }
        txn_mgr.add_task_info(info);

        Ok(CheckpointOutcome {
            txn_id: txn.txn_id(),
            commit_ts: txn.commit_ts(),
            max_commit_ts: txn.checkpoint_max_commit_ts(),
            artifacts: artifacts.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupTask;

impl CleanupTask {
    pub fn new() -> Self {
        Self
    }

    /// Run one cleanup pass and return the new cleanup watermark, which is
    /// never below `last_cleanup_ts`. Rotated log files wholly covered by the
    /// last checkpoint are removed afterwards.
    pub fn execute(
        &self,
        txn_mgr: &dyn TxnManager,
        wal: &WalManager,
        last_cleanup_ts: u64,
    ) -> TaskResult<u64> {
        let reported = txn_mgr.cleanup(last_cleanup_ts)?;
        let cur_cleanup_ts = reported.max(last_cleanup_ts);

        let mut purged = 0;
        if wal.has_checkpoint() {
            purged = purge_obsolete_wal_files(wal.wal_dir(), wal.last_checkpoint_ts())?.len();
            wal.metrics().add_wal_files_purged(purged as u64);
        }

        Logger::info(
            Event::CleanupComplete.as_str(),
            &[
                ("last_cleanup_ts", &last_cleanup_ts.to_string()),
                ("cleanup_ts", &cur_cleanup_ts.to_string()),
                ("wal_files_purged", &purged.to_string()),
            ],
        );
        Ok(cur_cleanup_ts)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactTask {
    pub db_name: String,
    pub table_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpIndexTask {
    pub db_name: String,
    pub table_name: String,
    pub index_name: String,
    pub segment_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendMemIndexTask {
    pub index_name: String,
    pub offset: u32,
    pub row_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCommandTask {
    pub command_content: String,
}

/// Uniform envelope the scheduler queues
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BgTask {
    Checkpoint(CheckpointTask),
    Cleanup(CleanupTask),
    Compact(CompactTask),
    DumpIndex(DumpIndexTask),
    AppendMemIndex(AppendMemIndexTask),
    TestCommand(TestCommandTask),
}

impl BgTask {
    pub fn task_type(&self) -> BgTaskType {
        match self {
            BgTask::Checkpoint(_) => BgTaskType::Checkpoint,
            BgTask::Cleanup(_) => BgTaskType::Cleanup,
            BgTask::Compact(_) => BgTaskType::Compact,
            BgTask::DumpIndex(_) => BgTaskType::DumpIndex,
            BgTask::AppendMemIndex(_) => BgTaskType::AppendMemIndex,
            BgTask::TestCommand(_) => BgTaskType::TestCommand,
        }
    }

    /// Whether the task opens its own transaction rather than running in
    /// the caller's.
    pub fn needs_new_txn(&self) -> bool {
        match self {
            BgTask::Checkpoint(task) => task.needs_new_txn,
            BgTask::Cleanup(_) | BgTask::Compact(_) | BgTask::AppendMemIndex(_) => false,
            BgTask::DumpIndex(_) | BgTask::TestCommand(_) => true,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            BgTask::Checkpoint(task) => format!("checkpoint task, wal size: {}", task.wal_size),
            BgTask::Cleanup(_) => "cleanup task".to_string(),
            BgTask::Compact(task) => {
                format!("compact task, table: {}.{}", task.db_name, task.table_name)
            }
            BgTask::DumpIndex(task) => format!(
                "dump index task, index: {}.{}.{}, segment: {}",
                task.db_name, task.table_name, task.index_name, task.segment_id
            ),
            BgTask::AppendMemIndex(task) => format!(
                "append mem index task, index: {}, offset: {}, rows: {}",
                task.index_name, task.offset, task.row_count
            ),
            BgTask::TestCommand(task) => format!("test command task: {}", task.command_content),
        }
    }

    /// Run a checkpoint envelope in the caller's transaction. Any other
    /// envelope, or a checkpoint that asked for its own transaction, is
    /// refused.
    pub fn execute_within_txn(&self, txn: &dyn CheckpointTxn, wal: &WalManager) -> TaskResult<()> {
        match self {
            BgTask::Checkpoint(task) if !task.needs_new_txn => task.execute_within_txn(txn, wal),
            other => Err(TaskError::NeedsNewTxn {
                task: other.task_type().as_str(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_type_tags() {
        let tasks = [
            (BgTask::Checkpoint(CheckpointTask::new(10)), BgTaskType::Checkpoint, true),
            (
                BgTask::Checkpoint(CheckpointTask::within_txn(10)),
                BgTaskType::Checkpoint,
                false,
            ),
            (BgTask::Cleanup(CleanupTask::new()), BgTaskType::Cleanup, false),
            (
                BgTask::DumpIndex(DumpIndexTask {
                    db_name: "db".into(),
                    table_name: "t".into(),
                    index_name: "idx".into(),
                    segment_id: 3,
                }),
                BgTaskType::DumpIndex,
                true,
            ),
            (
                BgTask::TestCommand(TestCommandTask {
                    command_content: "stuck".into(),
                }),
                BgTaskType::TestCommand,
                true,
            ),
        ];
        for (task, ty, new_txn) in tasks {
            assert_eq!(task.task_type(), ty);
            assert_eq!(task.needs_new_txn(), new_txn, "{}", task.describe());
        }
    }

    #[test]
    fn test_describe_names_the_target() {
        let task = BgTask::Compact(CompactTask {
            db_name: "default_db".into(),
            table_name: "orders".into(),
        });
        assert_eq!(task.describe(), "compact task, table: default_db.orders");
    }
}
