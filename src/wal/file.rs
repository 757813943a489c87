//! Log file directory
//!
//! One active file named `wal.log` plus any number of rotated files named
//! `wal.log.<max_commit_ts>`. Classification is purely by name, and listing
//! is a pure function of the directory contents.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::errors::{WalError, WalResult};
use crate::observability::{Event, Logger};

/// Name of the single file the flush thread appends to
pub const ACTIVE_WAL_FILENAME: &str = "wal.log";

fn rotated_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^wal\.log\.(\d+)$").ok())
        .as_ref()
}

/// What a directory entry is, judged by its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalFileKind {
    Active,
    Rotated(u64),
}

/// Classify a file name. Anything else in the directory is ignored.
pub fn classify(name: &str) -> Option<WalFileKind> {
    if name == ACTIVE_WAL_FILENAME {
        return Some(WalFileKind::Active);
    }
    let caps = rotated_pattern()?.captures(name)?;
    caps.get(1)?.as_str().parse().ok().map(WalFileKind::Rotated)
}

pub fn active_path(dir: &Path) -> PathBuf {
    dir.join(ACTIVE_WAL_FILENAME)
}

pub fn rotated_filename(max_commit_ts: u64) -> String {
    format!("{}.{}", ACTIVE_WAL_FILENAME, max_commit_ts)
}

pub fn rotated_path(dir: &Path, max_commit_ts: u64) -> PathBuf {
    dir.join(rotated_filename(max_commit_ts))
}

/// A rotated, immutable log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalFileInfo {
    pub path: PathBuf,
    pub max_commit_ts: u64,
}

/// Snapshot of the log files present in a directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalDirectory {
    pub active: Option<PathBuf>,
    /// Sorted by `max_commit_ts`, newest first
    pub rotated: Vec<WalFileInfo>,
}

impl WalDirectory {
    /// List `dir`. A missing directory has no log files.
    pub fn scan(dir: &Path) -> WalResult<Self> {
        let read_dir = match fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(WalError::io("cannot list WAL directory", e)
                    .with_details(format!("dir: {}", dir.display())))
            }
        };

        let mut listing = Self::default();
        for dirent in read_dir {
            let dirent = dirent.map_err(|e| WalError::io("cannot read WAL directory entry", e))?;
            let name = dirent.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match classify(name) {
                Some(WalFileKind::Active) => listing.active = Some(dirent.path()),
                Some(WalFileKind::Rotated(ts)) => listing.rotated.push(WalFileInfo {
                    path: dirent.path(),
                    max_commit_ts: ts,
                }),
                None => {}
            }
        }
        listing
            .rotated
            .sort_by(|a, b| b.max_commit_ts.cmp(&a.max_commit_ts));
        Ok(listing)
    }

    /// Files in the order the log iterator walks them: active first, then
    /// rotated files from newest to oldest.
    pub fn ordered_paths(&self) -> Vec<PathBuf> {
        self.active
            .iter()
            .cloned()
            .chain(self.rotated.iter().map(|f| f.path.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.rotated.is_empty()
    }

    pub fn newest_rotated_ts(&self) -> Option<u64> {
        self.rotated.first().map(|f| f.max_commit_ts)
    }
}

/// Delete rotated files entirely covered by a checkpoint.
///
/// A rotated file named `ts` holds only entries with `commit_ts <= ts`, so it
/// is redundant once `ts <= checkpoint_ts`. The active file is never touched.
pub fn purge_obsolete_wal_files(dir: &Path, checkpoint_ts: u64) -> WalResult<Vec<PathBuf>> {
    let listing = WalDirectory::scan(dir)?;
    let mut removed = Vec::new();
    for file in listing.rotated {
        if file.max_commit_ts > checkpoint_ts {
            continue;
        }
        match fs::remove_file(&file.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(WalError::io("cannot remove obsolete WAL file", e)
                    .with_details(format!("file: {}", file.path.display())))
            }
        }
        Logger::info(
            Event::WalFilePurged.as_str(),
            &[
                ("file", &file.path.display().to_string()),
                ("checkpoint_ts", &checkpoint_ts.to_string()),
            ],
        );
        removed.push(file.path);
    }
    Ok(removed)
}
