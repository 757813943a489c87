//! Background task registry
//!
//! Checkpoint and cleanup run against the transaction layer through
//! [`TxnManager`]; the other tasks are descriptors handed to the storage
//! layer. [`AppendMemIndexBatch`] is a completion barrier, not a queue.

mod batch;
mod errors;
mod info;
mod task;
mod txn;

pub use batch::AppendMemIndexBatch;
pub use errors::{TaskError, TaskResult};
pub use info::{BgTaskInfo, TaskHistory};
pub use task::{
    AppendMemIndexTask, BgTask, BgTaskType, CheckpointOutcome, CheckpointTask, CleanupTask,
    CompactTask, DumpIndexTask, TestCommandTask,
};
pub use txn::{CheckpointTxn, FlushedArtifact, TxnManager};
