//! Operator CLI
//!
//! - files: list log files
//! - dump: print log entries
//! - replay: replay a log into an in-memory catalog

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{dump, files, replay, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
