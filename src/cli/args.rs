//! CLI argument definitions using clap
//!
//! Commands:
//! - aerowal files --wal-dir <dir>
//! - aerowal dump --wal-dir <dir>
//! - aerowal replay --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aerowal - inspect and replay a write-ahead log directory
#[derive(Parser, Debug)]
#[command(name = "aerowal")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the active and rotated log files, newest first
    Files {
        #[arg(long)]
        wal_dir: PathBuf,
    },

    /// Print every decodable entry, newest first, one JSON object per line
    Dump {
        #[arg(long)]
        wal_dir: PathBuf,
    },

    /// Replay the log into an in-memory catalog and print a summary
    Replay {
        /// Path to configuration file
        #[arg(long, default_value = "./aerowal.json")]
        config: PathBuf,

        /// Treat the log as read-only, as a follower would
        #[arg(long)]
        readonly: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_defaults() {
        let cli = Cli::try_parse_from(["aerowal", "replay"]).unwrap();
        match cli.command {
            Command::Replay { config, readonly } => {
                assert_eq!(config, PathBuf::from("./aerowal.json"));
                assert!(!readonly);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_wal_dir_is_required() {
        assert!(Cli::try_parse_from(["aerowal", "files"]).is_err());
        assert!(Cli::try_parse_from(["aerowal", "dump", "--wal-dir", "/tmp/wal"]).is_ok());
    }
}
