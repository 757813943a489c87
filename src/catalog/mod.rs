//! Catalog collaborators of replay
//!
//! Replay never touches catalog internals. Every command is turned into one
//! reconstruction call carrying the original transaction id and commit
//! timestamp, so rebuilt entries carry exactly the timestamps they had when
//! first committed.

mod errors;
mod memory;

pub use errors::{CatalogError, CatalogResult};
pub use memory::{
    CatalogSnapshot, ChunkEntry, DatabaseEntry, IndexEntry, MemoryCatalog, MemoryPersistence,
    SegmentEntry, SegmentStatus, TableEntry,
};

use crate::wal::{
    ColumnDef, IndexDef, ObjectAddr, OptimizeParam, RowBatch, RowId, TableDef, WalChunkIndexInfo,
    WalSegmentInfo,
};

/// Identity of the transaction a replayed entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayTxn {
    pub txn_id: u64,
    pub commit_ts: u64,
}

/// Which command produced a replayed segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentSource {
    Import,
    Compact,
}

pub trait ReplayCatalog: Send + Sync {
    fn begin_replay_txn(&self, txn: ReplayTxn) -> CatalogResult<()>;

    /// Make everything applied under `txn` visible at its commit timestamp.
    fn commit_replay_txn(&self, txn: ReplayTxn) -> CatalogResult<()>;

    fn create_database(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        db_dir_tail: &str,
        comment: &str,
    ) -> CatalogResult<()>;

    fn drop_database(&self, txn: ReplayTxn, db_name: &str) -> CatalogResult<()>;

    fn create_table(&self, txn: ReplayTxn, db_name: &str, table_def: &TableDef) -> CatalogResult<()>;

    fn drop_table(&self, txn: ReplayTxn, db_name: &str, table_name: &str) -> CatalogResult<()>;

    fn create_index(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        index_def: &IndexDef,
    ) -> CatalogResult<()>;

    fn drop_index(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        index_name: &str,
    ) -> CatalogResult<()>;

    /// Register a sealed segment rebuilt from its size/offset descriptors.
    fn add_segment(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        segment: &WalSegmentInfo,
        source: SegmentSource,
    ) -> CatalogResult<()>;

    /// Mark a compacted-away segment no-delete and deprecate it at
    /// `txn.commit_ts`. Fails with [`CatalogError::SegmentTransition`] when
    /// the segment's state does not allow it.
    fn deprecate_segment(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        segment_id: u32,
    ) -> CatalogResult<()>;

    /// Append through the table-store write path used by live commits.
    /// `is_replay` is false when a follower applies logs shipped while both
    /// sides are running.
    fn append(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        rows: &RowBatch,
        is_replay: bool,
    ) -> CatalogResult<()>;

    fn delete(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        row_ids: &[RowId],
    ) -> CatalogResult<()>;

    fn optimize_index(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        index_name: &str,
        params: &[OptimizeParam],
    ) -> CatalogResult<()>;

    /// Add dumped chunks to the segment's index, creating the per-segment
    /// index entry if it does not exist yet.
    fn add_index_chunks(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        index_name: &str,
        segment_id: u32,
        chunks: &[WalChunkIndexInfo],
    ) -> CatalogResult<()>;

    /// Returns `Ok(false)` if the chunk is already gone.
    fn deprecate_index_chunk(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        index_name: &str,
        segment_id: u32,
        chunk_id: u32,
    ) -> CatalogResult<bool>;

    fn rename_table(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        new_table_name: &str,
    ) -> CatalogResult<()>;

    fn add_columns(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        columns: &[ColumnDef],
    ) -> CatalogResult<()>;

    fn drop_columns(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        column_names: &[String],
    ) -> CatalogResult<()>;

    /// Load materialized state shipped by a leader. Only called while a
    /// follower starts up.
    fn load_checkpoint(
        &self,
        txn: ReplayTxn,
        max_commit_ts: u64,
        catalog_path: &str,
    ) -> CatalogResult<()>;
}

/// Buffer/persistence layer registration of physical objects
pub trait PersistenceManager: Send + Sync {
    fn add_object(&self, addr: &ObjectAddr) -> CatalogResult<()>;
}
