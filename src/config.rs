//! Engine configuration
//!
//! Loaded from a JSON file. Every field except the directories has a default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// When appended bytes are forced to stable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// fsync after every batch; the only policy under which a finalized
    /// commit is guaranteed durable
    FlushAtOnce,
    /// hand bytes to the OS, never fsync
    OnlyWrite,
    /// hand bytes to the OS after every batch, fsync at most once a second
    FlushPerSecond,
}

impl FlushPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushPolicy::FlushAtOnce => "flush_at_once",
            FlushPolicy::OnlyWrite => "only_write",
            FlushPolicy::FlushPerSecond => "flush_per_second",
        }
    }
}

/// Whether this instance may write its own log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    Writable,
    Readable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationRole {
    Standalone,
    Leader,
    Follower,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalConfig {
    pub wal_dir: PathBuf,

    pub data_dir: PathBuf,

    /// Active-file size that triggers rotation (default 1 GiB)
    #[serde(default = "default_wal_size_threshold")]
    pub wal_size_threshold: u64,

    #[serde(default = "default_flush_policy")]
    pub flush_policy: FlushPolicy,

    /// Commit finalization threads (default 4)
    #[serde(default = "default_finalizer_workers")]
    pub finalizer_workers: usize,

    /// Submissions allowed to wait for the flush thread (default 65536)
    #[serde(default = "default_max_pending_txns")]
    pub max_pending_txns: usize,

    /// Log growth since the last checkpoint that makes a new one due
    /// (default 64 MiB)
    #[serde(default = "default_checkpoint_interval_bytes")]
    pub checkpoint_interval_bytes: u64,

    #[serde(default = "default_storage_mode")]
    pub storage_mode: StorageMode,

    #[serde(default = "default_replication_role")]
    pub replication_role: ReplicationRole,
}

fn default_wal_size_threshold() -> u64 {
    1 << 30
}
fn default_flush_policy() -> FlushPolicy {
    FlushPolicy::FlushAtOnce
}
fn default_finalizer_workers() -> usize {
    4
}
fn default_max_pending_txns() -> usize {
    65_536
}
fn default_checkpoint_interval_bytes() -> u64 {
    64 << 20
}
fn default_storage_mode() -> StorageMode {
    StorageMode::Writable
}
fn default_replication_role() -> ReplicationRole {
    ReplicationRole::Standalone
}

impl WalConfig {
    /// Defaults rooted at the given directories
    pub fn new(wal_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            wal_dir: wal_dir.into(),
            data_dir: data_dir.into(),
            wal_size_threshold: default_wal_size_threshold(),
            flush_policy: default_flush_policy(),
            finalizer_workers: default_finalizer_workers(),
            max_pending_txns: default_max_pending_txns(),
            checkpoint_interval_bytes: default_checkpoint_interval_bytes(),
            storage_mode: default_storage_mode(),
            replication_role: default_replication_role(),
        }
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: WalConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.wal_size_threshold == 0 {
            return Err(ConfigError::Invalid("wal_size_threshold must be > 0".into()));
        }
        if self.finalizer_workers == 0 {
            return Err(ConfigError::Invalid("finalizer_workers must be > 0".into()));
        }
        if self.max_pending_txns == 0 {
            return Err(ConfigError::Invalid("max_pending_txns must be > 0".into()));
        }
        if self.replication_role == ReplicationRole::Follower
            && self.storage_mode != StorageMode::Readable
        {
            return Err(ConfigError::Invalid(
                "a follower must run in readable storage mode".into(),
            ));
        }
        Ok(())
    }

    pub fn is_leader(&self) -> bool {
        self.replication_role == ReplicationRole::Leader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aerowal.json");
        fs::write(&path, r#"{"wal_dir": "/var/wal", "data_dir": "/var/data"}"#).unwrap();

        let config = WalConfig::load(&path).unwrap();
        assert_eq!(config, WalConfig::new("/var/wal", "/var/data"));
        assert_eq!(config.flush_policy, FlushPolicy::FlushAtOnce);
    }

    #[test]
    fn test_policy_and_role_names() {
        let json = r#"{
            "wal_dir": "w", "data_dir": "d",
            "flush_policy": "flush_per_second",
            "storage_mode": "readable",
            "replication_role": "follower"
        }"#;
        let config: WalConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.flush_policy, FlushPolicy::FlushPerSecond);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_writable_follower_rejected() {
        let mut config = WalConfig::new("w", "d");
        config.replication_role = ReplicationRole::Follower;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = WalConfig::new("w", "d");
        config.wal_size_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = WalConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
