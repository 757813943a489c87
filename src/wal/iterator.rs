//! Backward log iteration
//!
//! [`WalEntryIterator`] walks one file from its end to its start using the
//! size footer of each record. [`WalListIterator`] chains files in the order
//! supplied (active file first, then rotated files newest first) so entries
//! come out newest first.
//!
//! Before walking a file the iterator checks its last record. If it does not
//! decode, the file is scanned forward once to find the last complete record:
//! a partial record (or zero fill) after that point is an append that never
//! finished and is dropped with a warning; anything else is corruption and is
//! reported as an error item.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::codec::DecodeError;
use super::entry::{validate_size, LogEntry, ENTRY_FOOTER_SIZE, MIN_ENTRY_SIZE};
use super::errors::{WalError, WalResult};
use super::file::WalDirectory;
use crate::observability::{Event, Logger};

/// Newest-first iterator over the entries of a single file
pub struct WalEntryIterator {
    path: PathBuf,
    file: File,
    /// Records still to be yielded occupy `[0, end)`.
    end: u64,
    pending_error: Option<WalError>,
}

impl WalEntryIterator {
    pub fn open(path: &Path) -> WalResult<Self> {
        let file = File::open(path).map_err(|e| {
            WalError::io("cannot open WAL file for reading", e)
                .with_details(format!("file: {}", path.display()))
        })?;
        let len = file
            .metadata()
            .map_err(|e| WalError::io("cannot stat WAL file", e))?
            .len();
        let mut iter = Self {
            path: path.to_path_buf(),
            file,
            end: len,
            pending_error: None,
        };
        iter.clip_torn_tail()?;
        Ok(iter)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }

    fn tail_is_intact(&mut self) -> io::Result<bool> {
        if self.end == 0 {
            return Ok(true);
        }
        if self.end < MIN_ENTRY_SIZE as u64 {
            return Ok(false);
        }
        let mut footer = [0u8; ENTRY_FOOTER_SIZE];
        self.read_at(self.end - ENTRY_FOOTER_SIZE as u64, &mut footer)?;
        let size = match validate_size(u32::from_le_bytes(footer) as usize) {
            Ok(size) if size as u64 <= self.end => size,
            _ => return Ok(false),
        };
        let mut record = vec![0u8; size];
        self.read_at(self.end - size as u64, &mut record)?;
        Ok(LogEntry::read(&record).is_ok())
    }

    fn clip_torn_tail(&mut self) -> WalResult<()> {
        if self.tail_is_intact().map_err(|e| WalError::io("cannot read WAL tail", e))? {
            return Ok(());
        }

        let file_len = self.end;
        let mut bytes = Vec::with_capacity(file_len as usize);
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| (&mut self.file).take(file_len).read_to_end(&mut bytes))
            .map_err(|e| WalError::io("cannot scan WAL file", e))?;

        let mut offset = 0usize;
        while offset < bytes.len() {
            match LogEntry::read(&bytes[offset..]) {
                Ok((_, used)) => offset += used,
                Err(DecodeError::Insufficient { .. }) => break,
                Err(DecodeError::Malformed(_)) if bytes[offset..].iter().all(|b| *b == 0) => break,
                Err(DecodeError::Malformed(reason)) => {
                    self.pending_error = Some(WalError::corruption_at_offset(
                        &self.path_str(),
                        offset as u64,
                        reason,
                    ));
                    break;
                }
            }
        }

        if self.pending_error.is_none() && (offset as u64) < file_len {
            Logger::warn(
                Event::WalTornTail.as_str(),
                &[
                    ("file", &self.path_str()),
                    ("valid_bytes", &offset.to_string()),
                    ("discarded_bytes", &(file_len - offset as u64).to_string()),
                ],
            );
        }
        self.end = offset as u64;
        Ok(())
    }

    fn read_prev(&mut self) -> WalResult<LogEntry> {
        let end = self.end;
        if end < MIN_ENTRY_SIZE as u64 {
            return Err(WalError::corruption_at_offset(
                &self.path_str(),
                0,
                format!("{} leading bytes do not form a record", end),
            ));
        }

        let mut footer = [0u8; ENTRY_FOOTER_SIZE];
        self.read_at(end - ENTRY_FOOTER_SIZE as u64, &mut footer)
            .map_err(|e| WalError::io("cannot read WAL record footer", e))?;
        let size = validate_size(u32::from_le_bytes(footer) as usize)
            .map_err(|e| WalError::corruption_at_offset(&self.path_str(), end, e.to_string()))?;
        if size as u64 > end {
            return Err(WalError::corruption_at_offset(
                &self.path_str(),
                end,
                format!("record size {} runs past start of file", size),
            ));
        }

        let start = end - size as u64;
        let mut record = vec![0u8; size];
        self.read_at(start, &mut record)
            .map_err(|e| WalError::io("cannot read WAL record", e))?;
        let (entry, _) = LogEntry::read(&record)
            .map_err(|e| WalError::corruption_at_offset(&self.path_str(), start, e.to_string()))?;
        self.end = start;
        Ok(entry)
    }
}

impl Iterator for WalEntryIterator {
    type Item = WalResult<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending_error.take() {
            self.end = 0;
            return Some(Err(err));
        }
        if self.end == 0 {
            return None;
        }
        let item = self.read_prev();
        if item.is_err() {
            self.end = 0;
        }
        Some(item)
    }
}

/// Newest-first iterator across a list of files.
///
/// Only the file currently being read is open. The iterator stops after the
/// first error.
pub struct WalListIterator {
    pending: VecDeque<PathBuf>,
    current: Option<WalEntryIterator>,
    peeked: Option<WalResult<LogEntry>>,
    finished: bool,
}

impl WalListIterator {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            pending: paths.into(),
            current: None,
            peeked: None,
            finished: false,
        }
    }

    /// Iterate every log file in `dir`, newest entry first.
    pub fn from_dir(dir: &Path) -> WalResult<Self> {
        Ok(Self::new(WalDirectory::scan(dir)?.ordered_paths()))
    }

    pub fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.advance();
        }
        self.peeked.is_some()
    }

    /// File the most recent entry came from
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(WalEntryIterator::path)
    }

    fn advance(&mut self) -> Option<WalResult<LogEntry>> {
        if self.finished {
            return None;
        }
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.next() {
                    Some(item) => {
                        if item.is_err() {
                            self.finished = true;
                        }
                        return Some(item);
                    }
                    None => self.current = None,
                }
            }
            let Some(path) = self.pending.pop_front() else {
                self.finished = true;
                return None;
            };
            match WalEntryIterator::open(&path) {
                Ok(iter) => self.current = Some(iter),
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl Iterator for WalListIterator {
    type Item = WalResult<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.peeked.take().or_else(|| self.advance())
    }
}
