use thiserror::Error;

use crate::wal::WalError;

/// Failure reported by a background task or its transaction collaborator
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("transaction failed: {0}")]
    Txn(String),

    #[error("cleanup failed: {0}")]
    Cleanup(String),

    #[error("{task} must run in its own transaction")]
    NeedsNewTxn { task: &'static str },

    #[error(transparent)]
    Wal(#[from] WalError),
}

pub type TaskResult<T> = Result<T, TaskError>;
