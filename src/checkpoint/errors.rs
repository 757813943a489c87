//! Checkpoint-specific error types
//!
//! Checkpoint errors are ERROR severity. A failed checkpoint leaves the log
//! and the previous watermark intact; the next attempt starts over. Fatal
//! conditions met while the checkpoint entry is written surface through the
//! WAL manager's fatal handler, not through this type.

use std::fmt;

use crate::bg_task::TaskError;
use crate::wal::WalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation failed but system is healthy
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointErrorCode {
    /// General checkpoint creation failure
    AeroCheckpointFailed,
    /// Another checkpoint holds the single-flight gate
    AeroCheckpointInProgress,
    /// The checkpoint transaction could not be started or committed
    AeroCheckpointTxnFailed,
    /// The WAL manager refused or failed the checkpoint entry
    AeroCheckpointWalFailed,
}

impl CheckpointErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointErrorCode::AeroCheckpointFailed => "AERO_CHECKPOINT_FAILED",
            CheckpointErrorCode::AeroCheckpointInProgress => "AERO_CHECKPOINT_IN_PROGRESS",
            CheckpointErrorCode::AeroCheckpointTxnFailed => "AERO_CHECKPOINT_TXN_FAILED",
            CheckpointErrorCode::AeroCheckpointWalFailed => "AERO_CHECKPOINT_WAL_FAILED",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

impl fmt::Display for CheckpointErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
pub struct CheckpointError {
    code: CheckpointErrorCode,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CheckpointError {
    fn new(code: CheckpointErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(CheckpointErrorCode::AeroCheckpointFailed, message)
    }

    pub fn in_progress() -> Self {
        Self::new(
            CheckpointErrorCode::AeroCheckpointInProgress,
            "another checkpoint is running",
        )
    }

    pub fn txn_failed(message: impl Into<String>, source: TaskError) -> Self {
        Self::new(CheckpointErrorCode::AeroCheckpointTxnFailed, message).with_source(source)
    }

    pub fn wal_failed(message: impl Into<String>, source: WalError) -> Self {
        Self::new(CheckpointErrorCode::AeroCheckpointWalFailed, message).with_source(source)
    }

    pub fn code(&self) -> CheckpointErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Checkpoint errors never require process termination
    pub fn is_fatal(&self) -> bool {
        false
    }
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<TaskError> for CheckpointError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Wal(wal) => CheckpointError::wal_failed("checkpoint entry not written", wal),
            other => CheckpointError::txn_failed("checkpoint transaction failed", other),
        }
    }
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CheckpointErrorCode::AeroCheckpointFailed.as_str(),
            "AERO_CHECKPOINT_FAILED"
        );
        assert_eq!(
            CheckpointErrorCode::AeroCheckpointInProgress.as_str(),
            "AERO_CHECKPOINT_IN_PROGRESS"
        );
        assert_eq!(
            CheckpointErrorCode::AeroCheckpointTxnFailed.as_str(),
            "AERO_CHECKPOINT_TXN_FAILED"
        );
        assert_eq!(
            CheckpointErrorCode::AeroCheckpointWalFailed.as_str(),
            "AERO_CHECKPOINT_WAL_FAILED"
        );
    }

    #[test]
    fn test_checkpoint_errors_not_fatal() {
        let err = CheckpointError::in_progress();
        assert!(!err.is_fatal());
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn test_display_includes_cause() {
        let err = CheckpointError::from(TaskError::Txn("snapshot refused".into()));
        assert_eq!(err.code(), CheckpointErrorCode::AeroCheckpointTxnFailed);
        let display = err.to_string();
        assert!(display.contains("[ERROR] AERO_CHECKPOINT_TXN_FAILED"));
        assert!(display.contains("caused by"));
        assert!(display.contains("snapshot refused"));
    }

    #[test]
    fn test_wal_task_error_maps_to_wal_code() {
        let err = CheckpointError::from(TaskError::Wal(WalError::not_running()));
        assert_eq!(err.code(), CheckpointErrorCode::AeroCheckpointWalFailed);
    }
}
