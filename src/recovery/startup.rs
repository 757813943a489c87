//! Startup recovery
//!
//! Runs once before the flush thread starts:
//!
//! 1. Walk the log newest first to the most recent checkpoint
//! 2. Keep every entry committed after it, oldest first
//! 3. Replay those entries against the catalog
//! 4. Hand the resulting cursor to the WAL manager
//!
//! Any failure is returned to the caller; the engine must not start on a
//! partially replayed catalog.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::errors::RecoveryResult;
use super::replay::{ReplayOptions, WalReplayer};
use super::scan::{plan_replay, ReplayCursor};
use crate::catalog::{PersistenceManager, ReplayCatalog};
use crate::config::{ReplicationRole, StorageMode, WalConfig};
use crate::observability::{MetricsRegistry, ObservationScope};
use crate::wal::{CommandType, WalManager};

/// What startup recovery found and applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub cursor: ReplayCursor,
    pub checkpoint_found: bool,
    pub entries_replayed: u64,
    pub commands_by_type: BTreeMap<CommandType, u64>,
    pub missing_chunks: u64,
}

pub struct RecoveryManager {
    wal_dir: PathBuf,
    storage_mode: StorageMode,
    replication_role: ReplicationRole,
    replayer: WalReplayer,
}

impl RecoveryManager {
    pub fn new(
        config: &WalConfig,
        catalog: Arc<dyn ReplayCatalog>,
        persistence: Arc<dyn PersistenceManager>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            wal_dir: config.wal_dir.clone(),
            storage_mode: config.storage_mode,
            replication_role: config.replication_role,
            replayer: WalReplayer::new(catalog, persistence, metrics),
        }
    }

    pub fn wal_dir(&self) -> &Path {
        &self.wal_dir
    }

    fn options(&self) -> ReplayOptions {
        match self.replication_role {
            ReplicationRole::Follower => ReplayOptions::follower_startup(),
            ReplicationRole::Standalone | ReplicationRole::Leader => ReplayOptions::local_startup(),
        }
    }

    /// Replay everything committed after the last checkpoint.
    pub fn recover(&self) -> RecoveryResult<RecoveryReport> {
        let dir = self.wal_dir.display().to_string();
        let scope = ObservationScope::with_fields("WAL_RECOVERY", &[("wal_dir", &dir)]);

        let result = plan_replay(&self.wal_dir, self.storage_mode).and_then(|plan| {
            let stats = self
                .replayer
                .replay_entries(&plan.entries, plan.boundary(), self.options())?;
            Ok(RecoveryReport {
                cursor: plan.cursor,
                checkpoint_found: plan.checkpoint_found,
                entries_replayed: stats.entries_replayed,
                commands_by_type: stats.commands_by_type,
                missing_chunks: stats.missing_chunks,
            })
        });

        match result {
            Ok(report) => {
                scope.complete_with_fields(&[
                    ("checkpoint_found", &report.checkpoint_found.to_string()),
                    ("max_checkpoint_ts", &report.cursor.max_checkpoint_ts.to_string()),
                    ("last_commit_ts", &report.cursor.last_commit_ts.to_string()),
                    ("entries_replayed", &report.entries_replayed.to_string()),
                ]);
                Ok(report)
            }
            Err(e) => {
                if e.is_fatal() {
                    scope.fail_fatal(&e.to_string());
                } else {
                    scope.fail(&e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Recover, then seed the manager's commit state and watermark so it
    /// resumes where the log left off.
    pub fn recover_into(&self, wal: &WalManager) -> RecoveryResult<RecoveryReport> {
        let report = self.recover()?;
        wal.restore_from_replay(&report.cursor, report.checkpoint_found);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryCatalog, MemoryPersistence};
    use crate::recovery::RecoveryErrorCode;
    use crate::wal::{active_path, Command, LogEntry};
    use std::fs;
    use tempfile::TempDir;

    fn write_log(dir: &Path, entries: &[LogEntry]) {
        let mut bytes = Vec::new();
        for entry in entries {
            bytes.extend(entry.serialize().unwrap());
        }
        fs::write(active_path(dir), bytes).unwrap();
    }

    fn recovery_for(config: &WalConfig) -> (RecoveryManager, Arc<MemoryCatalog>) {
        let catalog = Arc::new(MemoryCatalog::new());
        let manager = RecoveryManager::new(
            config,
            catalog.clone(),
            Arc::new(MemoryPersistence::new()),
            Arc::new(MetricsRegistry::new()),
        );
        (manager, catalog)
    }

    fn create_db(txn_id: u64, ts: u64, name: &str) -> LogEntry {
        LogEntry::new(
            txn_id,
            ts,
            vec![Command::CreateDatabase {
                db_name: name.into(),
                db_dir_tail: name.into(),
                comment: "".into(),
            }],
        )
    }

    #[test]
    fn test_empty_log_is_fresh_start() {
        let dir = TempDir::new().unwrap();
        let config = WalConfig::new(dir.path(), dir.path());
        let (manager, catalog) = recovery_for(&config);
        let report = manager.recover().unwrap();
        assert!(!report.checkpoint_found);
        assert_eq!(report.entries_replayed, 0);
        assert!(catalog.snapshot().databases.is_empty());
    }

    #[test]
    fn test_replays_only_after_checkpoint() {
        let dir = TempDir::new().unwrap();
        write_log(
            dir.path(),
            &[
                create_db(1, 5, "old"),
                LogEntry::new(
                    2,
                    6,
                    vec![Command::Checkpoint {
                        max_commit_ts: 5,
                        catalog_path: "catalog".into(),
                    }],
                ),
                create_db(3, 7, "new"),
            ],
        );
        let config = WalConfig::new(dir.path(), dir.path());
        let (manager, catalog) = recovery_for(&config);
        let report = manager.recover().unwrap();

        assert!(report.checkpoint_found);
        assert_eq!(report.cursor.max_checkpoint_ts, 5);
        assert_eq!(report.cursor.last_commit_ts, 7);
        assert_eq!(report.cursor.max_txn_id, 3);
        assert_eq!(report.entries_replayed, 2);
        let snap = catalog.snapshot();
        assert!(snap.databases.contains_key("new"));
        assert!(!snap.databases.contains_key("old"));
    }

    #[test]
    fn test_missing_checkpoint_depends_on_mode() {
        let dir = TempDir::new().unwrap();
        write_log(dir.path(), &[create_db(1, 5, "db")]);

        let config = WalConfig::new(dir.path(), dir.path());
        let (manager, _) = recovery_for(&config);
        let err = manager.recover().unwrap_err();
        assert_eq!(err.code(), RecoveryErrorCode::AeroRecoveryNoCheckpoint);
        assert!(err.is_fatal());

        let mut config = WalConfig::new(dir.path(), dir.path());
        config.storage_mode = StorageMode::Readable;
        config.replication_role = ReplicationRole::Follower;
        let (manager, catalog) = recovery_for(&config);
        let report = manager.recover().unwrap();
        assert_eq!(report, RecoveryReport::default());
        assert!(catalog.snapshot().databases.is_empty());
    }
}
