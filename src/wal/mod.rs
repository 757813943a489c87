//! Write-ahead log
//!
//! No commit is finalized before its entry has been appended, and under
//! `flush_at_once` before that append is on stable storage.
//!
//! # Layout on disk
//!
//! One active file `wal.log` plus rotated files `wal.log.<max_commit_ts>`.
//! Each file is a sequence of self-delimiting records:
//!
//! ```text
//! [u32 size][u32 crc32][u64 txn_id][u64 commit_ts][u32 cmd_count][commands..][u32 size]
//! ```
//!
//! The trailing size lets readers walk a file from its end, which is how
//! replay finds the newest checkpoint without reading the whole log.
//!
//! # Invariants
//!
//! - Only the flush thread writes the active file
//! - Entries appear in the order transactions were dequeued
//! - The size computed before encoding equals the bytes produced
//! - A partial record at the end of a file is an unfinished append, not
//!   corruption

mod active;
mod checksum;
mod codec;
mod command;
mod entry;
mod errors;
mod file;
mod finalizer;
mod iterator;
mod manager;
mod queue;
mod txn;

pub use active::ActiveWalFile;
pub use checksum::{compute_checksum, verify_checksum};
pub use codec::{DecodeError, Decoder, Encoder, WalCodec};
pub use command::{
    ColumnChunk, ColumnDef, Command, CommandType, IndexDef, ObjectAddr, OptimizeParam, RowBatch,
    RowId, TableDef, WalBlockInfo, WalChunkIndexInfo, WalColumnInfo, WalSegmentInfo,
};
pub use entry::{LogEntry, ENTRY_FOOTER_SIZE, ENTRY_HEADER_SIZE, MAX_ENTRY_SIZE, MIN_ENTRY_SIZE};
pub use errors::{Severity, WalError, WalErrorCode, WalResult};
pub use file::{
    active_path, classify, purge_obsolete_wal_files, rotated_filename, rotated_path,
    WalDirectory, WalFileInfo, WalFileKind, ACTIVE_WAL_FILENAME,
};
pub use finalizer::FinalizerPool;
pub use iterator::{WalEntryIterator, WalListIterator};
pub use manager::{CommitState, FatalHandler, WalManager, WalManagerOptions};
pub use queue::SubmissionQueue;
pub use txn::{CommitFinalizer, ReplicationSink, TransactionType, TxnState, WalTxn};
