//! Collaborator interfaces of the flush path
//!
//! The WAL manager never owns transactions. It sees them through [`WalTxn`],
//! shares them with the finalizer pool through `Arc`, and hands serialized
//! bytes to replication through [`ReplicationSink`].

use std::fmt;
use std::sync::Arc;

use super::entry::LogEntry;

/// Lifecycle state of a transaction as seen by the flush loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Started,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxnState::Started => "STARTED",
            TxnState::Committing => "COMMITTING",
            TxnState::Committed => "COMMITTED",
            TxnState::RollingBack => "ROLLING_BACK",
            TxnState::RolledBack => "ROLLED_BACK",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Normal,
    /// Writes the checkpoint marker; the active file is rotated before its
    /// entry is appended.
    Checkpoint,
    Cleanup,
    Replay,
}

/// A transaction that has reached commit and carries a log entry
pub trait WalTxn: Send + Sync {
    fn txn_id(&self) -> u64;
    fn begin_ts(&self) -> u64;
    fn commit_ts(&self) -> u64;
    fn state(&self) -> TxnState;
    fn txn_type(&self) -> TransactionType;
    fn wal_entry(&self) -> &LogEntry;
}

/// Post-durability commit work: visibility flip and cleanup of
/// transaction-local state.
pub trait CommitFinalizer: Send + Sync {
    fn finalize(&self, txn: Arc<dyn WalTxn>);
}

/// Leader-side replication hook
pub trait ReplicationSink: Send + Sync {
    /// Queue one serialized entry for propagation.
    fn prepare_logs(&self, entry_bytes: Arc<[u8]>);

    /// Block until followers have acknowledged everything prepared so far.
    fn sync_logs(&self);
}
