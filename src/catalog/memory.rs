//! In-memory catalog
//!
//! Keeps just enough structure to check what replay rebuilt: entries with
//! their transaction ids and commit timestamps, row counts, segment states
//! and index chunks. Backs the `replay` command of the operator binary.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use super::errors::{CatalogError, CatalogResult};
use super::{PersistenceManager, ReplayCatalog, ReplayTxn, SegmentSource};
use crate::wal::{
    ColumnDef, IndexDef, ObjectAddr, OptimizeParam, RowBatch, RowId, TableDef, WalChunkIndexInfo,
    WalSegmentInfo,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    Sealed,
    Deprecated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentEntry {
    pub column_count: u64,
    pub row_count: u64,
    pub actual_row_count: u64,
    pub row_capacity: u64,
    pub block_count: usize,
    pub from_compact: bool,
    pub txn_id: u64,
    pub commit_ts: u64,
    pub status: SegmentStatus,
    pub no_delete: bool,
    pub deprecate_ts: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkEntry {
    pub base_name: String,
    pub base_row_id: RowId,
    pub row_count: u32,
    pub commit_ts: u64,
    pub deprecate_ts: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub index_type: String,
    pub column_names: Vec<String>,
    pub txn_id: u64,
    pub commit_ts: u64,
    pub params: Vec<OptimizeParam>,
    pub optimize_ts: Option<u64>,
    /// segment id -> chunk id -> chunk
    pub segments: BTreeMap<u32, BTreeMap<u32, ChunkEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableEntry {
    pub comment: String,
    pub columns: Vec<ColumnDef>,
    pub txn_id: u64,
    pub commit_ts: u64,
    pub row_count: u64,
    pub deleted_rows: u64,
    pub last_write_ts: Option<u64>,
    pub segments: BTreeMap<u32, SegmentEntry>,
    pub indexes: BTreeMap<String, IndexEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseEntry {
    pub dir_tail: String,
    pub comment: String,
    pub txn_id: u64,
    pub commit_ts: u64,
    pub tables: BTreeMap<String, TableEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSnapshot {
    pub databases: BTreeMap<String, DatabaseEntry>,
    pub checkpoint: Option<(u64, String)>,
    pub last_commit_ts: u64,
    pub replayed_txns: u64,
}

impl CatalogSnapshot {
    fn db_mut(&mut self, db_name: &str) -> CatalogResult<&mut DatabaseEntry> {
        self.databases
            .get_mut(db_name)
            .ok_or_else(|| CatalogError::DatabaseNotFound(db_name.to_string()))
    }

    fn table_mut(&mut self, db_name: &str, table_name: &str) -> CatalogResult<&mut TableEntry> {
        self.db_mut(db_name)?
            .tables
            .get_mut(table_name)
            .ok_or_else(|| CatalogError::TableNotFound {
                db: db_name.to_string(),
                table: table_name.to_string(),
            })
    }

    fn index_mut(
        &mut self,
        db_name: &str,
        table_name: &str,
        index_name: &str,
    ) -> CatalogResult<&mut IndexEntry> {
        self.table_mut(db_name, table_name)?
            .indexes
            .get_mut(index_name)
            .ok_or_else(|| CatalogError::IndexNotFound {
                table: table_name.to_string(),
                index: index_name.to_string(),
            })
    }

    pub fn table(&self, db_name: &str, table_name: &str) -> Option<&TableEntry> {
        self.databases.get(db_name)?.tables.get(table_name)
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    state: Mutex<CatalogSnapshot>,
    open_txn: Mutex<Option<ReplayTxn>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        lock(&self.state).clone()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut CatalogSnapshot) -> CatalogResult<T>) -> CatalogResult<T> {
        f(&mut lock(&self.state))
    }
}

impl ReplayCatalog for MemoryCatalog {
    fn begin_replay_txn(&self, txn: ReplayTxn) -> CatalogResult<()> {
        *lock(&self.open_txn) = Some(txn);
        Ok(())
    }

    fn commit_replay_txn(&self, txn: ReplayTxn) -> CatalogResult<()> {
        lock(&self.open_txn).take();
        self.with_state(|s| {
            s.last_commit_ts = s.last_commit_ts.max(txn.commit_ts);
            s.replayed_txns += 1;
            Ok(())
        })
    }

    fn create_database(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        db_dir_tail: &str,
        comment: &str,
    ) -> CatalogResult<()> {
        self.with_state(|s| {
            if s.databases.contains_key(db_name) {
                return Err(CatalogError::DatabaseExists(db_name.to_string()));
            }
            s.databases.insert(
                db_name.to_string(),
                DatabaseEntry {
                    dir_tail: db_dir_tail.to_string(),
                    comment: comment.to_string(),
                    txn_id: txn.txn_id,
                    commit_ts: txn.commit_ts,
                    tables: BTreeMap::new(),
                },
            );
            Ok(())
        })
    }

    fn drop_database(&self, _txn: ReplayTxn, db_name: &str) -> CatalogResult<()> {
        self.with_state(|s| {
            s.databases
                .remove(db_name)
                .map(|_| ())
                .ok_or_else(|| CatalogError::DatabaseNotFound(db_name.to_string()))
        })
    }

    fn create_table(&self, txn: ReplayTxn, db_name: &str, table_def: &TableDef) -> CatalogResult<()> {
        self.with_state(|s| {
            let db = s.db_mut(db_name)?;
            if db.tables.contains_key(&table_def.table_name) {
                return Err(CatalogError::TableExists {
                    db: db_name.to_string(),
                    table: table_def.table_name.clone(),
                });
            }
            db.tables.insert(
                table_def.table_name.clone(),
                TableEntry {
                    comment: table_def.comment.clone(),
                    columns: table_def.columns.clone(),
                    txn_id: txn.txn_id,
                    commit_ts: txn.commit_ts,
                    row_count: 0,
                    deleted_rows: 0,
                    last_write_ts: None,
                    segments: BTreeMap::new(),
                    indexes: BTreeMap::new(),
                },
            );
            Ok(())
        })
    }

    fn drop_table(&self, _txn: ReplayTxn, db_name: &str, table_name: &str) -> CatalogResult<()> {
        self.with_state(|s| {
            s.db_mut(db_name)?
                .tables
                .remove(table_name)
                .map(|_| ())
                .ok_or_else(|| CatalogError::TableNotFound {
                    db: db_name.to_string(),
                    table: table_name.to_string(),
                })
        })
    }

    fn create_index(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        index_def: &IndexDef,
    ) -> CatalogResult<()> {
        self.with_state(|s| {
            let table = s.table_mut(db_name, table_name)?;
            if table.indexes.contains_key(&index_def.index_name) {
                return Err(CatalogError::IndexExists {
                    table: table_name.to_string(),
                    index: index_def.index_name.clone(),
                });
            }
            table.indexes.insert(
                index_def.index_name.clone(),
                IndexEntry {
                    index_type: index_def.index_type.clone(),
                    column_names: index_def.column_names.clone(),
                    txn_id: txn.txn_id,
                    commit_ts: txn.commit_ts,
                    params: Vec::new(),
                    optimize_ts: None,
                    segments: BTreeMap::new(),
                },
            );
            Ok(())
        })
    }

    fn drop_index(
        &self,
        _txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        index_name: &str,
    ) -> CatalogResult<()> {
        self.with_state(|s| {
            s.table_mut(db_name, table_name)?
                .indexes
                .remove(index_name)
                .map(|_| ())
                .ok_or_else(|| CatalogError::IndexNotFound {
                    table: table_name.to_string(),
                    index: index_name.to_string(),
                })
        })
    }

    fn add_segment(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        segment: &WalSegmentInfo,
        source: SegmentSource,
    ) -> CatalogResult<()> {
        self.with_state(|s| {
            let table = s.table_mut(db_name, table_name)?;
            if source == SegmentSource::Import {
                table.row_count += segment.actual_row_count;
            }
            table.segments.insert(
                segment.segment_id,
                SegmentEntry {
                    column_count: segment.column_count,
                    row_count: segment.row_count,
                    actual_row_count: segment.actual_row_count,
                    row_capacity: segment.row_capacity,
                    block_count: segment.blocks.len(),
                    from_compact: source == SegmentSource::Compact,
                    txn_id: txn.txn_id,
                    commit_ts: txn.commit_ts,
                    status: SegmentStatus::Sealed,
                    no_delete: false,
                    deprecate_ts: None,
                },
            );
            Ok(())
        })
    }

    fn deprecate_segment(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        segment_id: u32,
    ) -> CatalogResult<()> {
        self.with_state(|s| {
            let table = s.table_mut(db_name, table_name)?;
            let segment =
                table
                    .segments
                    .get_mut(&segment_id)
                    .ok_or_else(|| CatalogError::SegmentNotFound {
                        table: table_name.to_string(),
                        segment_id,
                    })?;
            if segment.status != SegmentStatus::Sealed || segment.no_delete {
                return Err(CatalogError::SegmentTransition {
                    segment_id,
                    reason: format!("status {:?}, no_delete {}", segment.status, segment.no_delete),
                });
            }
            segment.no_delete = true;
            segment.status = SegmentStatus::Deprecated;
            segment.deprecate_ts = Some(txn.commit_ts);
            Ok(())
        })
    }

    fn append(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        rows: &RowBatch,
        _is_replay: bool,
    ) -> CatalogResult<()> {
        self.with_state(|s| {
            let table = s.table_mut(db_name, table_name)?;
            table.row_count += u64::from(rows.row_count);
            table.last_write_ts = Some(txn.commit_ts);
            Ok(())
        })
    }

    fn delete(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        row_ids: &[RowId],
    ) -> CatalogResult<()> {
        self.with_state(|s| {
            let table = s.table_mut(db_name, table_name)?;
            table.deleted_rows += row_ids.len() as u64;
            table.last_write_ts = Some(txn.commit_ts);
            Ok(())
        })
    }

    fn optimize_index(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        index_name: &str,
        params: &[OptimizeParam],
    ) -> CatalogResult<()> {
        self.with_state(|s| {
            let index = s.index_mut(db_name, table_name, index_name)?;
            index.params = params.to_vec();
            index.optimize_ts = Some(txn.commit_ts);
            Ok(())
        })
    }

    fn add_index_chunks(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        index_name: &str,
        segment_id: u32,
        chunks: &[WalChunkIndexInfo],
    ) -> CatalogResult<()> {
        self.with_state(|s| {
            let index = s.index_mut(db_name, table_name, index_name)?;
            let segment = index.segments.entry(segment_id).or_default();
            for chunk in chunks {
                segment.insert(
                    chunk.chunk_id,
                    ChunkEntry {
                        base_name: chunk.base_name.clone(),
                        base_row_id: chunk.base_row_id,
                        row_count: chunk.row_count,
                        commit_ts: txn.commit_ts,
                        deprecate_ts: None,
                    },
                );
            }
            Ok(())
        })
    }

    fn deprecate_index_chunk(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        index_name: &str,
        segment_id: u32,
        chunk_id: u32,
    ) -> CatalogResult<bool> {
        self.with_state(|s| {
            let index = s.index_mut(db_name, table_name, index_name)?;
            let chunk = index
                .segments
                .get_mut(&segment_id)
                .and_then(|chunks| chunks.get_mut(&chunk_id));
            Ok(match chunk {
                Some(chunk) => {
                    chunk.deprecate_ts = Some(txn.commit_ts);
                    true
                }
                None => false,
            })
        })
    }

    fn rename_table(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        new_table_name: &str,
    ) -> CatalogResult<()> {
        self.with_state(|s| {
            let db = s.db_mut(db_name)?;
            if db.tables.contains_key(new_table_name) {
                return Err(CatalogError::TableExists {
                    db: db_name.to_string(),
                    table: new_table_name.to_string(),
                });
            }
            let mut table = db.tables.remove(table_name).ok_or_else(|| {
                CatalogError::TableNotFound {
                    db: db_name.to_string(),
                    table: table_name.to_string(),
                }
            })?;
            table.txn_id = txn.txn_id;
            table.commit_ts = txn.commit_ts;
            db.tables.insert(new_table_name.to_string(), table);
            Ok(())
        })
    }

    fn add_columns(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        columns: &[ColumnDef],
    ) -> CatalogResult<()> {
        self.with_state(|s| {
            let table = s.table_mut(db_name, table_name)?;
            let mut updated = table.columns.clone();
            for column in columns {
                if updated.iter().any(|c| c.name == column.name) {
                    return Err(CatalogError::Column {
                        table: table_name.to_string(),
                        column: column.name.clone(),
                        reason: "already exists".into(),
                    });
                }
                updated.push(column.clone());
            }
            table.columns = updated;
            table.txn_id = txn.txn_id;
            table.commit_ts = txn.commit_ts;
            Ok(())
        })
    }

    fn drop_columns(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        column_names: &[String],
    ) -> CatalogResult<()> {
        self.with_state(|s| {
            let table = s.table_mut(db_name, table_name)?;
            let mut updated = table.columns.clone();
            for name in column_names {
                let Some(pos) = updated.iter().position(|c| &c.name == name) else {
                    return Err(CatalogError::Column {
                        table: table_name.to_string(),
                        column: name.clone(),
                        reason: "not found".into(),
                    });
                };
                updated.remove(pos);
            }
            table.columns = updated;
            table.txn_id = txn.txn_id;
            table.commit_ts = txn.commit_ts;
            Ok(())
        })
    }

    fn load_checkpoint(
        &self,
        _txn: ReplayTxn,
        max_commit_ts: u64,
        catalog_path: &str,
    ) -> CatalogResult<()> {
        self.with_state(|s| {
            s.checkpoint = Some((max_commit_ts, catalog_path.to_string()));
            Ok(())
        })
    }
}

/// Records every object address it is given
#[derive(Default)]
pub struct MemoryPersistence {
    objects: Mutex<Vec<ObjectAddr>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objects(&self) -> Vec<ObjectAddr> {
        lock(&self.objects).clone()
    }
}

impl PersistenceManager for MemoryPersistence {
    fn add_object(&self, addr: &ObjectAddr) -> CatalogResult<()> {
        lock(&self.objects).push(addr.clone());
        Ok(())
    }
}
