//! Transaction-layer collaborators used by background tasks

use std::sync::Arc;

use serde::Serialize;

use super::errors::TaskResult;
use super::info::BgTaskInfo;

/// One block a checkpoint wrote out of memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushedArtifact {
    pub db_id: String,
    pub table_id: String,
    pub segment_id: u32,
    pub block_id: u16,
    pub to_flush: String,
}

/// Transaction that materializes a checkpoint
pub trait CheckpointTxn: Send + Sync {
    fn txn_id(&self) -> u64;

    /// Valid once the transaction has committed.
    fn commit_ts(&self) -> u64;

    /// WAL size at the moment the checkpoint was scheduled.
    fn set_wal_size(&self, wal_size: u64);

    /// Flush everything committed since `last_checkpoint_ts` and stage the
    /// checkpoint entry for commit.
    fn checkpoint(&self, last_checkpoint_ts: u64) -> TaskResult<()>;

    /// Watermark the staged checkpoint entry records.
    fn checkpoint_max_commit_ts(&self) -> u64;

    fn flushed_artifacts(&self) -> Vec<FlushedArtifact>;
}

pub trait TxnManager: Send + Sync {
    fn begin_checkpoint_txn(&self) -> TaskResult<Arc<dyn CheckpointTxn>>;

    /// Commit through the WAL and return once the entry is durable.
    fn commit_checkpoint_txn(&self, txn: &Arc<dyn CheckpointTxn>) -> TaskResult<()>;

    /// Release versions no reader can see any more. Returns the new
    /// cleanup timestamp.
    fn cleanup(&self, last_cleanup_ts: u64) -> TaskResult<u64>;

    fn add_task_info(&self, info: BgTaskInfo);
}
