//! CLI command implementations
//!
//! Commands only read the log directory. Nothing here starts a flush thread
//! or writes a log file.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{CatalogSnapshot, MemoryCatalog, MemoryPersistence};
use crate::config::{StorageMode, WalConfig};
use crate::observability::MetricsRegistry;
use crate::recovery::{RecoveryManager, RecoveryReport};
use crate::wal::{WalDirectory, WalListIterator};

use super::args::{Cli, Command};
use super::errors::CliResult;
use super::io::{write_line, write_response};

/// One line of `files` output
#[derive(Debug, Serialize)]
struct FileLine<'a> {
    kind: &'static str,
    path: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_commit_ts: Option<u64>,
}

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args().command)
}

pub fn run_command(cmd: Command) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    let result = match cmd {
        Command::Files { wal_dir } => files(&wal_dir, &mut stdout),
        Command::Dump { wal_dir } => dump(&wal_dir, &mut stdout),
        Command::Replay { config, readonly } => replay(&config, readonly, &mut stdout),
    };
    result?;
    stdout.flush()?;
    Ok(())
}

/// List the active file, then rotated files newest first.
pub fn files<W: Write>(wal_dir: &Path, out: &mut W) -> CliResult<()> {
    let dir = WalDirectory::scan(wal_dir)?;
    if let Some(active) = &dir.active {
        write_line(
            out,
            &FileLine {
                kind: "active",
                path: active,
                max_commit_ts: None,
            },
        )?;
    }
    for rotated in &dir.rotated {
        write_line(
            out,
            &FileLine {
                kind: "rotated",
                path: &rotated.path,
                max_commit_ts: Some(rotated.max_commit_ts),
            },
        )?;
    }
    Ok(())
}

/// Print entries newest first. Stops at the first corrupt record, after
/// printing everything before it.
pub fn dump<W: Write>(wal_dir: &Path, out: &mut W) -> CliResult<()> {
    for item in WalListIterator::from_dir(wal_dir)? {
        write_line(out, &item?)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct ReplaySummary<'a> {
    report: &'a RecoveryReport,
    catalog: &'a CatalogSnapshot,
    objects_registered: usize,
}

/// Replay into an in-memory catalog and print what was rebuilt.
pub fn replay<W: Write>(config_path: &Path, readonly: bool, out: &mut W) -> CliResult<()> {
    let mut config = WalConfig::load(config_path)?;
    if readonly {
        config.storage_mode = StorageMode::Readable;
    }

    let catalog = Arc::new(MemoryCatalog::new());
    let persistence = Arc::new(MemoryPersistence::new());
    let manager = RecoveryManager::new(
        &config,
        catalog.clone(),
        persistence.clone(),
        Arc::new(MetricsRegistry::new()),
    );
    let report = manager.recover()?;
    let snapshot = catalog.snapshot();

    write_response(
        out,
        &ReplaySummary {
            report: &report,
            catalog: &snapshot,
            objects_registered: persistence.objects().len(),
        },
    )
}
