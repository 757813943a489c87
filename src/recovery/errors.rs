//! Recovery error types
//!
//! Error codes:
//! - AERO_WAL_CORRUPTION (FATAL)
//! - AERO_RECOVERY_NO_WAL (FATAL)
//! - AERO_RECOVERY_NO_CHECKPOINT (FATAL)
//! - AERO_RECOVERY_ILLEGAL_CHECKPOINT (FATAL)
//! - AERO_RECOVERY_REPLAY_FAILED (FATAL)
//! - AERO_RECOVERY_SEGMENT_TRANSITION (FATAL)
//! - AERO_RECOVERY_FAILED (FATAL)
//! - AERO_RECOVERY_UNSUPPORTED (ERROR, reported to the caller)

use std::fmt;

use crate::catalog::CatalogError;
use crate::wal::{WalError, WalErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Reported to the caller, process continues
    Error,
    /// System must halt immediately
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryErrorCode {
    /// A record could not be decoded where a whole one was required
    AeroWalCorruption,
    /// No log file exists where one was required
    AeroRecoveryNoWal,
    /// Writable log with entries but no checkpoint
    AeroRecoveryNoCheckpoint,
    /// Checkpoint command outside the boundary and not a follower startup
    AeroRecoveryIllegalCheckpoint,
    /// The catalog rejected a replayed command
    AeroRecoveryReplayFailed,
    /// A compacted segment could not be deprecated
    AeroRecoverySegmentTransition,
    /// General recovery failure
    AeroRecoveryFailed,
    /// Command has no replay path yet
    AeroRecoveryUnsupported,
}

impl RecoveryErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            RecoveryErrorCode::AeroWalCorruption => "AERO_WAL_CORRUPTION",
            RecoveryErrorCode::AeroRecoveryNoWal => "AERO_RECOVERY_NO_WAL",
            RecoveryErrorCode::AeroRecoveryNoCheckpoint => "AERO_RECOVERY_NO_CHECKPOINT",
            RecoveryErrorCode::AeroRecoveryIllegalCheckpoint => {
                "AERO_RECOVERY_ILLEGAL_CHECKPOINT"
            }
            RecoveryErrorCode::AeroRecoveryReplayFailed => "AERO_RECOVERY_REPLAY_FAILED",
            RecoveryErrorCode::AeroRecoverySegmentTransition => {
                "AERO_RECOVERY_SEGMENT_TRANSITION"
            }
            RecoveryErrorCode::AeroRecoveryFailed => "AERO_RECOVERY_FAILED",
            RecoveryErrorCode::AeroRecoveryUnsupported => "AERO_RECOVERY_UNSUPPORTED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            RecoveryErrorCode::AeroRecoveryUnsupported => Severity::Error,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for RecoveryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug)]
pub struct RecoveryError {
    code: RecoveryErrorCode,
    message: String,
    /// Commit timestamp of the entry being handled, if any
    commit_ts: Option<u64>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl RecoveryError {
    fn new(code: RecoveryErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            commit_ts: None,
            source: None,
        }
    }

    fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn at_commit_ts(mut self, commit_ts: u64) -> Self {
        self.commit_ts = Some(commit_ts);
        self
    }

    pub fn wal_corruption(reason: impl Into<String>) -> Self {
        Self::new(RecoveryErrorCode::AeroWalCorruption, reason)
    }

    pub fn no_wal(dir: &str) -> Self {
        Self::new(
            RecoveryErrorCode::AeroRecoveryNoWal,
            format!("no WAL file in {}", dir),
        )
    }

    pub fn no_checkpoint(dir: &str) -> Self {
        Self::new(
            RecoveryErrorCode::AeroRecoveryNoCheckpoint,
            format!("WAL in {} has entries but no checkpoint", dir),
        )
    }

    pub fn illegal_checkpoint(max_commit_ts: u64) -> Self {
        Self::new(
            RecoveryErrorCode::AeroRecoveryIllegalCheckpoint,
            format!(
                "checkpoint at {} found past the replay boundary outside follower startup",
                max_commit_ts
            ),
        )
    }

    pub fn replay_failed(command: &str, source: CatalogError) -> Self {
        let code = match source {
            CatalogError::SegmentTransition { .. } => {
                RecoveryErrorCode::AeroRecoverySegmentTransition
            }
            _ => RecoveryErrorCode::AeroRecoveryReplayFailed,
        };
        Self::new(code, format!("replaying {} failed", command)).with_source(source)
    }

    pub fn unsupported(command: &str) -> Self {
        Self::new(
            RecoveryErrorCode::AeroRecoveryUnsupported,
            format!("{} cannot be replayed", command),
        )
    }

    pub fn recovery_failed(reason: impl Into<String>) -> Self {
        Self::new(RecoveryErrorCode::AeroRecoveryFailed, reason)
    }

    pub fn code(&self) -> RecoveryErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn commit_ts(&self) -> Option<u64> {
        self.commit_ts
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)?;
        if let Some(ts) = self.commit_ts {
            write!(f, " (commit_ts {})", ts)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for RecoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<WalError> for RecoveryError {
    fn from(err: WalError) -> Self {
        let code = match err.code() {
            WalErrorCode::AeroWalCorruption => RecoveryErrorCode::AeroWalCorruption,
            _ => RecoveryErrorCode::AeroRecoveryFailed,
        };
        Self::new(code, err.message().to_string()).with_source(err)
    }
}

pub type RecoveryResult<T> = Result<T, RecoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(RecoveryErrorCode::AeroWalCorruption.code(), "AERO_WAL_CORRUPTION");
        assert_eq!(
            RecoveryErrorCode::AeroRecoveryNoCheckpoint.code(),
            "AERO_RECOVERY_NO_CHECKPOINT"
        );
        assert_eq!(
            RecoveryErrorCode::AeroRecoveryIllegalCheckpoint.code(),
            "AERO_RECOVERY_ILLEGAL_CHECKPOINT"
        );
        assert_eq!(
            RecoveryErrorCode::AeroRecoveryUnsupported.code(),
            "AERO_RECOVERY_UNSUPPORTED"
        );
    }

    #[test]
    fn test_only_unsupported_is_recoverable() {
        assert!(!RecoveryError::unsupported("ALTER_INFO").is_fatal());
        assert!(RecoveryError::no_checkpoint("/wal").is_fatal());
        assert!(RecoveryError::illegal_checkpoint(7).is_fatal());
        assert!(RecoveryError::wal_corruption("bad crc").is_fatal());
    }

    #[test]
    fn test_segment_transition_gets_its_own_code() {
        let err = RecoveryError::replay_failed(
            "COMPACT",
            CatalogError::SegmentTransition {
                segment_id: 4,
                reason: "already deprecated".into(),
            },
        );
        assert_eq!(err.code(), RecoveryErrorCode::AeroRecoverySegmentTransition);
        assert!(err.to_string().contains("already deprecated"));
    }

    #[test]
    fn test_wal_corruption_keeps_code() {
        let err = RecoveryError::from(WalError::corruption("torn record mid-file"));
        assert_eq!(err.code(), RecoveryErrorCode::AeroWalCorruption);
        let err = RecoveryError::from(WalError::size_mismatch(10, 12));
        assert_eq!(err.code(), RecoveryErrorCode::AeroRecoveryFailed);
    }

    #[test]
    fn test_display() {
        let err = RecoveryError::wal_corruption("checksum mismatch").at_commit_ts(12);
        let display = err.to_string();
        assert!(display.starts_with("[FATAL] AERO_WAL_CORRUPTION"));
        assert!(display.contains("commit_ts 12"));
    }
}
