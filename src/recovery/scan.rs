//! Locating the checkpoint and the entries to replay
//!
//! The log is walked newest entry first. The first checkpoint command met
//! fixes the watermark; the walk then continues into older entries until it
//! reaches one at or below that watermark. One rule selects candidates
//! everywhere: `commit_ts > max_checkpoint_ts`. The entry that carries the
//! checkpoint passes that rule like any other and is replayed with its
//! boundary command skipped.

use std::path::Path;

use serde::Serialize;

use super::errors::{RecoveryError, RecoveryResult};
use crate::config::StorageMode;
use crate::observability::{Event, Logger};
use crate::wal::{LogEntry, WalDirectory, WalListIterator};

/// Where replay stands once candidates are known or applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayCursor {
    pub max_txn_id: u64,
    pub last_commit_ts: u64,
    pub max_checkpoint_ts: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayPlan {
    pub cursor: ReplayCursor,
    /// False for an empty log, or a log without checkpoint on a read-only
    /// node
    pub checkpoint_found: bool,
    /// Oldest first, in original commit order
    pub entries: Vec<LogEntry>,
}

impl ReplayPlan {
    /// The checkpoint timestamp replay must skip, if one was found
    pub fn boundary(&self) -> Option<u64> {
        self.checkpoint_found
            .then_some(self.cursor.max_checkpoint_ts)
    }
}

struct Scan {
    /// Newest first, the checkpoint entry included at its position
    entries: Vec<LogEntry>,
    checkpoint: Option<LogEntry>,
    max_checkpoint_ts: u64,
    saw_any: bool,
}

fn next_entry(iter: &mut WalListIterator) -> RecoveryResult<Option<LogEntry>> {
    match iter.next() {
        Some(Ok(entry)) => Ok(Some(entry)),
        Some(Err(e)) => Err(RecoveryError::from(e)),
        None => Ok(None),
    }
}

fn scan_dir(dir: &Path) -> RecoveryResult<Scan> {
    let mut iter = WalListIterator::from_dir(dir)?;
    let mut entries = Vec::new();
    let mut checkpoint = None;
    let mut max_checkpoint_ts = 0;
    let mut saw_any = false;

    // newest entries down to the most recent checkpoint
    while let Some(entry) = next_entry(&mut iter)? {
        saw_any = true;
        if let Some(ts) = entry.checkpoint_ts() {
            max_checkpoint_ts = ts;
            checkpoint = Some(entry.clone());
            entries.push(entry);
            break;
        }
        entries.push(entry);
    }

    if checkpoint.is_some() {
        // older entries the checkpoint does not cover yet
        while let Some(entry) = next_entry(&mut iter)? {
            if entry.commit_ts <= max_checkpoint_ts {
                break;
            }
            entries.push(entry);
        }
    }

    Ok(Scan {
        entries,
        checkpoint,
        max_checkpoint_ts,
        saw_any,
    })
}

/// Find the replay boundary and the entries above it.
///
/// A log with entries but no checkpoint is fatal on a writable node and
/// means "nothing to replay" on a read-only one. An empty log is a fresh
/// start in either mode.
pub fn plan_replay(dir: &Path, mode: StorageMode) -> RecoveryResult<ReplayPlan> {
    let scan = scan_dir(dir)?;
    let dir_str = dir.display().to_string();

    let Some(checkpoint) = scan.checkpoint else {
        Logger::warn(
            Event::RecoveryNoCheckpoint.as_str(),
            &[
                ("wal_dir", &dir_str),
                ("entries_seen", &scan.saw_any.to_string()),
            ],
        );
        if scan.saw_any && mode == StorageMode::Writable {
            return Err(RecoveryError::no_checkpoint(&dir_str));
        }
        return Ok(ReplayPlan::default());
    };

    let max_checkpoint_ts = scan.max_checkpoint_ts;
    let mut entries = scan.entries;
    entries.retain(|e| e.commit_ts > max_checkpoint_ts);
    let mut cursor = ReplayCursor {
        max_txn_id: checkpoint.txn_id,
        last_commit_ts: checkpoint.commit_ts,
        max_checkpoint_ts,
    };
    entries.reverse();
    for entry in &entries {
        cursor.max_txn_id = cursor.max_txn_id.max(entry.txn_id);
        cursor.last_commit_ts = cursor.last_commit_ts.max(entry.commit_ts);
    }

    Logger::info(
        Event::RecoveryScanComplete.as_str(),
        &[
            ("max_checkpoint_ts", &max_checkpoint_ts.to_string()),
            ("last_commit_ts", &cursor.last_commit_ts.to_string()),
            ("candidates", &entries.len().to_string()),
        ],
    );

    Ok(ReplayPlan {
        cursor,
        checkpoint_found: true,
        entries,
    })
}

/// The checkpoint entry and everything newer, oldest first.
///
/// Unlike [`plan_replay`] the checkpoint entry is always included, and a
/// missing log or a log without checkpoint is an error regardless of mode.
pub fn collect_wal_entries(dir: &Path) -> RecoveryResult<Vec<LogEntry>> {
    let dir_str = dir.display().to_string();
    if WalDirectory::scan(dir)?.is_empty() {
        return Err(RecoveryError::no_wal(&dir_str));
    }
    let scan = scan_dir(dir)?;
    let Some(checkpoint) = scan.checkpoint else {
        return Err(RecoveryError::no_checkpoint(&dir_str));
    };

    let max_checkpoint_ts = scan.max_checkpoint_ts;
    let mut entries = scan.entries;
    entries.retain(|e| e.commit_ts > max_checkpoint_ts || e.commit_ts == checkpoint.commit_ts);
    entries.reverse();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::RecoveryErrorCode;
    use crate::wal::{active_path, rotated_path, Command};
    use std::fs;
    use tempfile::TempDir;

    fn normal(txn_id: u64, ts: u64) -> LogEntry {
        LogEntry::new(
            txn_id,
            ts,
            vec![Command::DropDatabase {
                db_name: format!("db{}", ts),
            }],
        )
    }

    fn checkpoint(txn_id: u64, ts: u64, max_commit_ts: u64) -> LogEntry {
        LogEntry::new(
            txn_id,
            ts,
            vec![Command::Checkpoint {
                max_commit_ts,
                catalog_path: "catalog/full.json".into(),
            }],
        )
    }

    fn write_file(path: &Path, entries: &[LogEntry]) {
        let mut buf = Vec::new();
        for e in entries {
            buf.extend(e.serialize().unwrap());
        }
        fs::write(path, buf).unwrap();
    }

    fn ts(entries: &[LogEntry]) -> Vec<u64> {
        entries.iter().map(|e| e.commit_ts).collect()
    }

    #[test]
    fn test_empty_dir_is_fresh_start() {
        let dir = TempDir::new().unwrap();
        let plan = plan_replay(dir.path(), StorageMode::Writable).unwrap();
        assert!(!plan.checkpoint_found);
        assert!(plan.entries.is_empty());
        assert_eq!(plan.cursor, ReplayCursor::default());
    }

    #[test]
    fn test_no_checkpoint_depends_on_mode() {
        let dir = TempDir::new().unwrap();
        write_file(&active_path(dir.path()), &[normal(1, 1), normal(2, 2)]);

        let err = plan_replay(dir.path(), StorageMode::Writable).unwrap_err();
        assert_eq!(err.code(), RecoveryErrorCode::AeroRecoveryNoCheckpoint);
        assert!(err.is_fatal());

        let plan = plan_replay(dir.path(), StorageMode::Readable).unwrap();
        assert!(!plan.checkpoint_found);
        assert_eq!(plan.cursor, ReplayCursor::default());
    }

    #[test]
    fn test_checkpoint_in_rotated_file() {
        let dir = TempDir::new().unwrap();
        write_file(&rotated_path(dir.path(), 9), &[normal(8, 8), checkpoint(9, 9, 7)]);
        write_file(&active_path(dir.path()), &[normal(10, 10), normal(11, 11)]);

        let plan = plan_replay(dir.path(), StorageMode::Writable).unwrap();
        assert!(plan.checkpoint_found);
        assert_eq!(plan.boundary(), Some(7));
        assert_eq!(ts(&plan.entries), vec![8, 9, 10, 11]);
        assert_eq!(
            plan.cursor,
            ReplayCursor {
                max_txn_id: 11,
                last_commit_ts: 11,
                max_checkpoint_ts: 7
            }
        );
    }

    #[test]
    fn test_entries_at_watermark_are_not_candidates() {
        let dir = TempDir::new().unwrap();
        write_file(
            &rotated_path(dir.path(), 5),
            &[normal(1, 3), normal(2, 4), normal(3, 5)],
        );
        write_file(&active_path(dir.path()), &[checkpoint(4, 6, 4), normal(5, 7)]);

        let plan = plan_replay(dir.path(), StorageMode::Writable).unwrap();
        // ts 4 equals the watermark and stops the walk; ts 3 is never read
        assert_eq!(ts(&plan.entries), vec![5, 6, 7]);
    }

    #[test]
    fn test_collect_includes_checkpoint_entry() {
        let dir = TempDir::new().unwrap();
        write_file(&rotated_path(dir.path(), 9), &[normal(8, 8), checkpoint(9, 9, 7)]);
        write_file(&active_path(dir.path()), &[normal(10, 10)]);

        let entries = collect_wal_entries(dir.path()).unwrap();
        assert_eq!(ts(&entries), vec![8, 9, 10]);
        assert_eq!(entries[1].checkpoint_ts(), Some(7));
    }

    #[test]
    fn test_collect_requires_files_and_checkpoint() {
        let dir = TempDir::new().unwrap();
        let err = collect_wal_entries(dir.path()).unwrap_err();
        assert_eq!(err.code(), RecoveryErrorCode::AeroRecoveryNoWal);

        write_file(&active_path(dir.path()), &[normal(1, 1)]);
        let err = collect_wal_entries(dir.path()).unwrap_err();
        assert_eq!(err.code(), RecoveryErrorCode::AeroRecoveryNoCheckpoint);
    }

    #[test]
    fn test_corruption_before_checkpoint_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut bytes = normal(1, 1).serialize().unwrap();
        bytes.extend(normal(2, 2).serialize().unwrap());
        // flip a byte inside the first record's body
        bytes[20] ^= 0xFF;
        fs::write(active_path(dir.path()), bytes).unwrap();

        let err = plan_replay(dir.path(), StorageMode::Readable).unwrap_err();
        assert_eq!(err.code(), RecoveryErrorCode::AeroWalCorruption);
    }
}
