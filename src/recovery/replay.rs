//! Forward application of replay candidates
//!
//! Each entry becomes one replay transaction carrying the entry's own
//! transaction id and commit timestamp. Commands go through the catalog's
//! reconstruction calls, never its validation paths: they were validated
//! once already, when first committed.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::errors::{RecoveryError, RecoveryResult};
use crate::catalog::{
    CatalogError, PersistenceManager, ReplayCatalog, ReplayTxn, SegmentSource,
};
use crate::crash_point::{maybe_crash, points};
use crate::observability::{Event, Logger, MetricsRegistry};
use crate::wal::{Command, CommandType, LogEntry, WalSegmentInfo};

/// How the entries being replayed reached this node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Replaying before the engine starts serving
    pub on_startup: bool,
    /// Rows were already persisted by the original write
    pub is_replay: bool,
    /// Entries were shipped by a leader
    pub sync_from_leader: bool,
}

impl ReplayOptions {
    /// Replay of this node's own log at startup
    pub fn local_startup() -> Self {
        Self {
            on_startup: true,
            is_replay: true,
            sync_from_leader: false,
        }
    }

    /// Follower bootstrap from a leader's log
    pub fn follower_startup() -> Self {
        Self {
            on_startup: true,
            is_replay: true,
            sync_from_leader: true,
        }
    }

    /// Follower applying logs while both sides run
    pub fn follower_live() -> Self {
        Self {
            on_startup: false,
            is_replay: false,
            sync_from_leader: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub entries_replayed: u64,
    pub max_txn_id: u64,
    pub last_commit_ts: u64,
    pub commands_by_type: BTreeMap<CommandType, u64>,
    pub missing_chunks: u64,
}

pub struct WalReplayer {
    catalog: Arc<dyn ReplayCatalog>,
    persistence: Arc<dyn PersistenceManager>,
    metrics: Arc<MetricsRegistry>,
}

impl WalReplayer {
    pub fn new(
        catalog: Arc<dyn ReplayCatalog>,
        persistence: Arc<dyn PersistenceManager>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            catalog,
            persistence,
            metrics,
        }
    }

    /// Apply `entries` in order. `boundary` is the checkpoint timestamp the
    /// entries were selected against; its own checkpoint command is skipped.
    pub fn replay_entries(
        &self,
        entries: &[LogEntry],
        boundary: Option<u64>,
        options: ReplayOptions,
    ) -> RecoveryResult<ReplayStats> {
        Logger::info(
            Event::RecoveryReplayBegin.as_str(),
            &[
                ("entries", &entries.len().to_string()),
                ("on_startup", &options.on_startup.to_string()),
                ("sync_from_leader", &options.sync_from_leader.to_string()),
            ],
        );

        let mut stats = ReplayStats::default();
        for entry in entries {
            self.replay_entry(entry, boundary, options, &mut stats)?;
        }
        self.metrics.add_entries_replayed(stats.entries_replayed);

        Logger::info(
            Event::RecoveryReplayComplete.as_str(),
            &[
                ("entries_replayed", &stats.entries_replayed.to_string()),
                ("last_commit_ts", &stats.last_commit_ts.to_string()),
                ("max_txn_id", &stats.max_txn_id.to_string()),
            ],
        );
        Ok(stats)
    }

    pub fn replay_entry(
        &self,
        entry: &LogEntry,
        boundary: Option<u64>,
        options: ReplayOptions,
        stats: &mut ReplayStats,
    ) -> RecoveryResult<()> {
        let txn = ReplayTxn {
            txn_id: entry.txn_id,
            commit_ts: entry.commit_ts,
        };
        let at = |e: RecoveryError| e.at_commit_ts(entry.commit_ts);

        self.catalog
            .begin_replay_txn(txn)
            .map_err(|e| at(RecoveryError::replay_failed("BEGIN", e)))?;
        for cmd in &entry.commands {
            Logger::trace(
                Event::RecoveryReplayCommand.as_str(),
                &[
                    ("command", cmd.command_type().as_str()),
                    ("commit_ts", &entry.commit_ts.to_string()),
                ],
            );
            self.replay_command(txn, cmd, boundary, options, stats)
                .map_err(at)?;
            *stats.commands_by_type.entry(cmd.command_type()).or_default() += 1;
        }
        maybe_crash(points::REPLAY_BEFORE_COMMIT);
        self.catalog
            .commit_replay_txn(txn)
            .map_err(|e| at(RecoveryError::replay_failed("COMMIT", e)))?;

        stats.entries_replayed += 1;
        stats.max_txn_id = stats.max_txn_id.max(entry.txn_id);
        stats.last_commit_ts = stats.last_commit_ts.max(entry.commit_ts);
        Ok(())
    }

    fn replay_command(
        &self,
        txn: ReplayTxn,
        cmd: &Command,
        boundary: Option<u64>,
        options: ReplayOptions,
        stats: &mut ReplayStats,
    ) -> RecoveryResult<()> {
        let failed = |e: CatalogError| RecoveryError::replay_failed(cmd.command_type().as_str(), e);
        let catalog = &*self.catalog;

        let applied = match cmd {
            Command::CreateDatabase {
                db_name,
                db_dir_tail,
                comment,
            } => catalog.create_database(txn, db_name, db_dir_tail, comment),
            Command::DropDatabase { db_name } => catalog.drop_database(txn, db_name),
            Command::CreateTable { db_name, table_def } => {
                catalog.create_table(txn, db_name, table_def)
            }
            Command::DropTable {
                db_name,
                table_name,
            } => catalog.drop_table(txn, db_name, table_name),
            Command::CreateIndex {
                db_name,
                table_name,
                index_def,
            } => catalog.create_index(txn, db_name, table_name, index_def),
            Command::DropIndex {
                db_name,
                table_name,
                index_name,
            } => catalog.drop_index(txn, db_name, table_name, index_name),
            Command::Import {
                db_name,
                table_name,
                segment_info,
            } => self.replay_segment(txn, db_name, table_name, segment_info, SegmentSource::Import),
            Command::Append {
                db_name,
                table_name,
                rows,
            } => catalog.append(txn, db_name, table_name, rows, options.is_replay),
            Command::Delete {
                db_name,
                table_name,
                row_ids,
            } => catalog.delete(txn, db_name, table_name, row_ids),
            Command::Compact {
                db_name,
                table_name,
                new_segments,
                deprecated_segment_ids,
            } => new_segments
                .iter()
                .try_for_each(|segment| {
                    self.replay_segment(txn, db_name, table_name, segment, SegmentSource::Compact)
                })
                .and_then(|()| {
                    deprecated_segment_ids
                        .iter()
                        .try_for_each(|id| catalog.deprecate_segment(txn, db_name, table_name, *id))
                }),
            Command::Optimize {
                db_name,
                table_name,
                index_name,
                params,
            } => catalog.optimize_index(txn, db_name, table_name, index_name, params),
            Command::DumpIndex {
                db_name,
                table_name,
                index_name,
                segment_id,
                chunks,
                deprecate_chunk_ids,
            } => {
                catalog
                    .add_index_chunks(txn, db_name, table_name, index_name, *segment_id, chunks)
                    .map_err(failed)?;
                for addr in chunks.iter().flat_map(|c| c.addrs.iter()) {
                    self.persistence.add_object(addr).map_err(failed)?;
                }
                for chunk_id in deprecate_chunk_ids {
                    let found = catalog
                        .deprecate_index_chunk(
                            txn,
                            db_name,
                            table_name,
                            index_name,
                            *segment_id,
                            *chunk_id,
                        )
                        .map_err(failed)?;
                    if !found {
                        stats.missing_chunks += 1;
                        Logger::warn(
                            Event::RecoveryMissingChunk.as_str(),
                            &[
                                ("index", index_name),
                                ("segment_id", &segment_id.to_string()),
                                ("chunk_id", &chunk_id.to_string()),
                            ],
                        );
                    }
                }
                Ok(())
            }
            Command::RenameTable {
                db_name,
                table_name,
                new_table_name,
            } => catalog.rename_table(txn, db_name, table_name, new_table_name),
            Command::AddColumns {
                db_name,
                table_name,
                columns,
            } => catalog.add_columns(txn, db_name, table_name, columns),
            Command::DropColumns {
                db_name,
                table_name,
                column_names,
            } => catalog.drop_columns(txn, db_name, table_name, column_names),
            Command::Checkpoint {
                max_commit_ts,
                catalog_path,
            } => {
                if boundary == Some(*max_commit_ts) {
                    return Ok(());
                }
                if !options.on_startup {
                    // a running follower sees the leader's checkpoints go by
                    return Ok(());
                }
                if !options.sync_from_leader {
                    return Err(RecoveryError::illegal_checkpoint(*max_commit_ts));
                }
                catalog.load_checkpoint(txn, *max_commit_ts, catalog_path)
            }
            Command::AlterInfo { .. } => {
                return Err(RecoveryError::unsupported(cmd.command_type().as_str()))
            }
        };
        applied.map_err(failed)
    }

    /// Rebuild one sealed segment and register its physical objects.
    fn replay_segment(
        &self,
        txn: ReplayTxn,
        db_name: &str,
        table_name: &str,
        segment: &WalSegmentInfo,
        source: SegmentSource,
    ) -> Result<(), CatalogError> {
        self.catalog
            .add_segment(txn, db_name, table_name, segment, source)?;
        for addr in segment.blocks.iter().flat_map(|b| b.addrs.iter()) {
            self.persistence.add_object(addr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryCatalog, MemoryPersistence, SegmentStatus};
    use crate::recovery::RecoveryErrorCode;
    use crate::wal::{ObjectAddr, RowBatch, TableDef, WalBlockInfo};

    fn fixture() -> (WalReplayer, Arc<MemoryCatalog>, Arc<MemoryPersistence>) {
        let catalog = Arc::new(MemoryCatalog::new());
        let persistence = Arc::new(MemoryPersistence::new());
        let replayer = WalReplayer::new(
            catalog.clone(),
            persistence.clone(),
            Arc::new(MetricsRegistry::new()),
        );
        (replayer, catalog, persistence)
    }

    fn setup_entries() -> Vec<LogEntry> {
        vec![
            LogEntry::new(
                1,
                10,
                vec![
                    Command::CreateDatabase {
                        db_name: "db".into(),
                        db_dir_tail: "db_dir".into(),
                        comment: "".into(),
                    },
                    Command::CreateTable {
                        db_name: "db".into(),
                        table_def: TableDef {
                            table_name: "t".into(),
                            comment: "".into(),
                            columns: vec![],
                        },
                    },
                ],
            ),
            LogEntry::new(
                2,
                11,
                vec![Command::Append {
                    db_name: "db".into(),
                    table_name: "t".into(),
                    rows: RowBatch {
                        row_count: 3,
                        columns: vec![],
                    },
                }],
            ),
        ]
    }

    fn segment(id: u32) -> WalSegmentInfo {
        WalSegmentInfo {
            segment_id: id,
            column_count: 1,
            row_count: 4,
            actual_row_count: 4,
            row_capacity: 8192,
            blocks: vec![WalBlockInfo {
                block_id: 0,
                row_count: 4,
                row_capacity: 8192,
                columns: vec![],
                addrs: vec![ObjectAddr {
                    obj_key: format!("obj_{}", id),
                    part_offset: 0,
                    part_size: 64,
                }],
            }],
        }
    }

    #[test]
    fn test_entries_apply_with_original_timestamps() {
        let (replayer, catalog, _) = fixture();
        let stats = replayer
            .replay_entries(&setup_entries(), None, ReplayOptions::local_startup())
            .unwrap();

        assert_eq!(stats.entries_replayed, 2);
        assert_eq!((stats.max_txn_id, stats.last_commit_ts), (2, 11));
        assert_eq!(stats.commands_by_type[&CommandType::Append], 1);

        let snap = catalog.snapshot();
        let table = snap.table("db", "t").unwrap();
        assert_eq!((table.txn_id, table.commit_ts), (1, 10));
        assert_eq!(table.row_count, 3);
        assert_eq!(table.last_write_ts, Some(11));
        assert_eq!(snap.last_commit_ts, 11);
    }

    #[test]
    fn test_boundary_checkpoint_is_skipped_other_commands_applied() {
        let (replayer, catalog, _) = fixture();
        let entry = LogEntry::new(
            5,
            9,
            vec![
                Command::Checkpoint {
                    max_commit_ts: 7,
                    catalog_path: "catalog".into(),
                },
                Command::CreateDatabase {
                    db_name: "late".into(),
                    db_dir_tail: "late".into(),
                    comment: "".into(),
                },
            ],
        );
        replayer
            .replay_entries(&[entry], Some(7), ReplayOptions::local_startup())
            .unwrap();
        let snap = catalog.snapshot();
        assert!(snap.databases.contains_key("late"));
        assert_eq!(snap.checkpoint, None);
    }

    #[test]
    fn test_checkpoint_past_boundary() {
        let entry = LogEntry::new(
            6,
            12,
            vec![Command::Checkpoint {
                max_commit_ts: 11,
                catalog_path: "leader/catalog".into(),
            }],
        );

        let (replayer, _, _) = fixture();
        let err = replayer
            .replay_entries(std::slice::from_ref(&entry), Some(7), ReplayOptions::local_startup())
            .unwrap_err();
        assert_eq!(err.code(), RecoveryErrorCode::AeroRecoveryIllegalCheckpoint);
        assert!(err.is_fatal());
        assert_eq!(err.commit_ts(), Some(12));

        let (replayer, catalog, _) = fixture();
        replayer
            .replay_entries(std::slice::from_ref(&entry), None, ReplayOptions::follower_startup())
            .unwrap();
        assert_eq!(
            catalog.snapshot().checkpoint,
            Some((11, "leader/catalog".to_string()))
        );

        let (replayer, catalog, _) = fixture();
        replayer
            .replay_entries(&[entry], None, ReplayOptions::follower_live())
            .unwrap();
        assert_eq!(catalog.snapshot().checkpoint, None);
    }

    #[test]
    fn test_alter_info_is_unsupported() {
        let (replayer, _, _) = fixture();
        let mut entries = setup_entries();
        entries.push(LogEntry::new(
            3,
            12,
            vec![Command::AlterInfo {
                db_name: "db".into(),
                table_name: "t".into(),
                info: "comment".into(),
            }],
        ));
        let err = replayer
            .replay_entries(&entries, None, ReplayOptions::local_startup())
            .unwrap_err();
        assert_eq!(err.code(), RecoveryErrorCode::AeroRecoveryUnsupported);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_import_and_compact_register_objects() {
        let (replayer, catalog, persistence) = fixture();
        let mut entries = setup_entries();
        entries.push(LogEntry::new(
            3,
            12,
            vec![Command::Import {
                db_name: "db".into(),
                table_name: "t".into(),
                segment_info: segment(0),
            }],
        ));
        entries.push(LogEntry::new(
            4,
            13,
            vec![Command::Compact {
                db_name: "db".into(),
                table_name: "t".into(),
                new_segments: vec![segment(1)],
                deprecated_segment_ids: vec![0],
            }],
        ));
        replayer
            .replay_entries(&entries, None, ReplayOptions::local_startup())
            .unwrap();

        let keys: Vec<_> = persistence.objects().into_iter().map(|a| a.obj_key).collect();
        assert_eq!(keys, vec!["obj_0", "obj_1"]);

        let snap = catalog.snapshot();
        let table = snap.table("db", "t").unwrap();
        assert_eq!(table.segments[&0].status, SegmentStatus::Deprecated);
        assert_eq!(table.segments[&0].deprecate_ts, Some(13));
        assert!(table.segments[&1].from_compact);
    }

    #[test]
    fn test_compact_of_missing_segment_is_fatal() {
        let (replayer, _, _) = fixture();
        let mut entries = setup_entries();
        entries.push(LogEntry::new(
            3,
            12,
            vec![Command::Compact {
                db_name: "db".into(),
                table_name: "t".into(),
                new_segments: vec![],
                deprecated_segment_ids: vec![9],
            }],
        ));
        let err = replayer
            .replay_entries(&entries, None, ReplayOptions::local_startup())
            .unwrap_err();
        assert_eq!(err.code(), RecoveryErrorCode::AeroRecoveryReplayFailed);
        assert!(err.is_fatal());
    }
}
