//! The active log file
//!
//! Exactly one `ActiveWalFile` exists per WAL directory and only the flush
//! thread holds it, so appends need no lock.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::errors::{WalError, WalResult};
use super::file::{active_path, rotated_path, WalDirectory};
use crate::config::FlushPolicy;
use crate::crash_point::{maybe_crash, points};
use crate::observability::{Event, Logger};

const PERIODIC_SYNC_INTERVAL: Duration = Duration::from_secs(1);

pub struct ActiveWalFile {
    dir: PathBuf,
    path: PathBuf,
    writer: BufWriter<File>,
    len: u64,
    last_swap_ts: u64,
    policy: FlushPolicy,
    last_sync: Instant,
}

fn open_append(path: &Path) -> WalResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| WalError::open_failed(&path.display().to_string(), e))
}

impl ActiveWalFile {
    /// Open (or create) `wal.log` in `dir`. Rotation resumes after the newest
    /// rotated file already present.
    pub fn open(dir: &Path, policy: FlushPolicy) -> WalResult<Self> {
        fs::create_dir_all(dir)
            .map_err(|e| WalError::open_failed(&dir.display().to_string(), e))?;
        let last_swap_ts = WalDirectory::scan(dir)?.newest_rotated_ts().unwrap_or(0);

        let path = active_path(dir);
        let file = open_append(&path)?;
        let len = file
            .metadata()
            .map_err(|e| WalError::open_failed(&path.display().to_string(), e))?
            .len();

        Ok(Self {
            dir: dir.to_path_buf(),
            path,
            writer: BufWriter::new(file),
            len,
            last_swap_ts,
            policy,
            last_sync: Instant::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes in the active file, including any still buffered
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn last_swap_ts(&self) -> u64 {
        self.last_swap_ts
    }

    pub fn append(&mut self, bytes: &[u8]) -> WalResult<()> {
        maybe_crash(points::WAL_BEFORE_APPEND);
        self.writer
            .write_all(bytes)
            .map_err(|e| WalError::append_failed("write to active WAL file failed", e))?;
        self.len += bytes.len() as u64;
        maybe_crash(points::WAL_AFTER_APPEND);
        Ok(())
    }

    /// Push buffered bytes out according to the configured policy.
    pub fn flush(&mut self) -> WalResult<()> {
        self.writer
            .flush()
            .map_err(|e| WalError::append_failed("write to active WAL file failed", e))?;
        let sync = match self.policy {
            FlushPolicy::FlushAtOnce => true,
            FlushPolicy::OnlyWrite => false,
            FlushPolicy::FlushPerSecond => self.last_sync.elapsed() >= PERIODIC_SYNC_INTERVAL,
        };
        if sync {
            self.sync()?;
        }
        maybe_crash(points::WAL_AFTER_FLUSH);
        Ok(())
    }

    fn sync(&mut self) -> WalResult<()> {
        self.writer
            .get_ref()
            .sync_data()
            .map_err(|e| WalError::fsync_failed("fsync of active WAL file failed", e))?;
        self.last_sync = Instant::now();
        Ok(())
    }

    /// Rotate the active file to `wal.log.<max_commit_ts>` and start an empty
    /// one.
    ///
    /// A timestamp at or below the last rotation is a no-op and returns
    /// `Ok(false)`. If the target name is taken, `error_if_duplicate` decides
    /// between failing and discarding the current active file (a follower
    /// re-syncing history it already has).
    pub fn swap(&mut self, max_commit_ts: u64, error_if_duplicate: bool) -> WalResult<bool> {
        if max_commit_ts <= self.last_swap_ts {
            return Ok(false);
        }
        maybe_crash(points::WAL_BEFORE_SWAP);

        self.writer
            .flush()
            .map_err(|e| WalError::append_failed("write to active WAL file failed", e))?;
        self.sync()?;

        let target = rotated_path(&self.dir, max_commit_ts);
        if target.exists() {
            if error_if_duplicate {
                return Err(WalError::duplicate_file(&target.display().to_string()));
            }
            fs::remove_file(&self.path)
                .map_err(|e| WalError::rotate_failed("cannot discard active WAL file", e))?;
        } else {
            fs::rename(&self.path, &target)
                .map_err(|e| WalError::rotate_failed("cannot rename active WAL file", e))?;
        }

        // The old handle is dropped here; the new active file must open or
        // the log has no writable tail.
        self.writer = BufWriter::new(open_append(&self.path)?);
        self.len = 0;
        self.last_swap_ts = max_commit_ts;
        maybe_crash(points::WAL_AFTER_SWAP);

        Logger::info(
            Event::WalSwap.as_str(),
            &[
                ("max_commit_ts", &max_commit_ts.to_string()),
                ("rotated_file", &target.display().to_string()),
            ],
        );
        Ok(true)
    }
}
