//! WAL error types
//!
//! Error codes:
//! - AERO_WAL_APPEND_FAILED (FATAL severity)
//! - AERO_WAL_FSYNC_FAILED (FATAL severity)
//! - AERO_WAL_CORRUPTION (FATAL severity)
//! - AERO_WAL_SIZE_MISMATCH (FATAL severity)
//! - AERO_WAL_OPEN_FAILED (FATAL severity)
//! - AERO_WAL_DUPLICATE_FILE (FATAL severity)
//! - AERO_WAL_PROTOCOL_VIOLATION (FATAL severity)
//! - AERO_WAL_ROTATE_FAILED (ERROR severity)
//! - AERO_WAL_NOT_RUNNING (ERROR severity)
//! - AERO_WAL_BACKPRESSURE (ERROR severity)
//! - AERO_WAL_IO (ERROR severity)

use std::fmt;
use std::io;

/// Severity levels for WAL errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, caller may log and continue
    Error,
    /// The log may be inconsistent, the process must abort
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

/// WAL-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalErrorCode {
    /// Writing an entry to the active file failed
    AeroWalAppendFailed,
    /// Flushing the active file failed
    AeroWalFsyncFailed,
    /// A record could not be decoded where a whole record was required
    AeroWalCorruption,
    /// Encoded length differs from the computed size
    AeroWalSizeMismatch,
    /// Entry is larger than any reader accepts
    AeroWalEntryTooLarge,
    /// The active file could not be opened or created
    AeroWalOpenFailed,
    /// A rotated file with the same timestamp already exists
    AeroWalDuplicateFile,
    /// A transaction reached the flush loop outside the committing state
    AeroWalProtocolViolation,
    /// Size-threshold rotation failed transiently
    AeroWalRotateFailed,
    /// The manager is not accepting submissions
    AeroWalNotRunning,
    /// The submission queue is full
    AeroWalBackpressure,
    /// Directory listing or file removal failed
    AeroWalIo,
}

impl WalErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            WalErrorCode::AeroWalAppendFailed => "AERO_WAL_APPEND_FAILED",
            WalErrorCode::AeroWalFsyncFailed => "AERO_WAL_FSYNC_FAILED",
            WalErrorCode::AeroWalCorruption => "AERO_WAL_CORRUPTION",
            WalErrorCode::AeroWalSizeMismatch => "AERO_WAL_SIZE_MISMATCH",
            WalErrorCode::AeroWalEntryTooLarge => "AERO_WAL_ENTRY_TOO_LARGE",
            WalErrorCode::AeroWalOpenFailed => "AERO_WAL_OPEN_FAILED",
            WalErrorCode::AeroWalDuplicateFile => "AERO_WAL_DUPLICATE_FILE",
            WalErrorCode::AeroWalProtocolViolation => "AERO_WAL_PROTOCOL_VIOLATION",
            WalErrorCode::AeroWalRotateFailed => "AERO_WAL_ROTATE_FAILED",
            WalErrorCode::AeroWalNotRunning => "AERO_WAL_NOT_RUNNING",
            WalErrorCode::AeroWalBackpressure => "AERO_WAL_BACKPRESSURE",
            WalErrorCode::AeroWalIo => "AERO_WAL_IO",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            WalErrorCode::AeroWalAppendFailed
            | WalErrorCode::AeroWalFsyncFailed
            | WalErrorCode::AeroWalCorruption
            | WalErrorCode::AeroWalSizeMismatch
            | WalErrorCode::AeroWalEntryTooLarge
            | WalErrorCode::AeroWalOpenFailed
            | WalErrorCode::AeroWalDuplicateFile
            | WalErrorCode::AeroWalProtocolViolation => Severity::Fatal,
            WalErrorCode::AeroWalRotateFailed
            | WalErrorCode::AeroWalNotRunning
            | WalErrorCode::AeroWalBackpressure
            | WalErrorCode::AeroWalIo => Severity::Error,
        }
    }
}

impl fmt::Display for WalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// WAL error type with full context
#[derive(Debug)]
pub struct WalError {
    code: WalErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl Clone for WalError {
    // io::Error is not Clone; the copy keeps its kind and text.
    fn clone(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            details: self.details.clone(),
            source: self
                .source
                .as_ref()
                .map(|e| io::Error::new(e.kind(), e.to_string())),
        }
    }
}

impl WalError {
    fn new(code: WalErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    fn with_source(mut self, source: io::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach free-form context (file path, timestamps)
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn append_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(WalErrorCode::AeroWalAppendFailed, message).with_source(source)
    }

    pub fn fsync_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(WalErrorCode::AeroWalFsyncFailed, message).with_source(source)
    }

    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(WalErrorCode::AeroWalCorruption, message)
    }

    /// Corruption with the file and byte offset where decoding stopped
    pub fn corruption_at_offset(path: &str, offset: u64, reason: impl Into<String>) -> Self {
        Self::new(WalErrorCode::AeroWalCorruption, reason)
            .with_details(format!("file: {}, byte_offset: {}", path, offset))
    }

    pub fn size_mismatch(expected: usize, actual: usize) -> Self {
        Self::new(
            WalErrorCode::AeroWalSizeMismatch,
            "encoded entry length differs from computed size",
        )
        .with_details(format!("expected: {}, actual: {}", expected, actual))
    }

    pub fn entry_too_large(size: usize, max: usize) -> Self {
        Self::new(
            WalErrorCode::AeroWalEntryTooLarge,
            "entry exceeds the maximum record size",
        )
        .with_details(format!("size: {}, max: {}", size, max))
    }

    pub fn open_failed(path: &str, source: io::Error) -> Self {
        Self::new(WalErrorCode::AeroWalOpenFailed, "cannot open active WAL file")
            .with_details(format!("file: {}", path))
            .with_source(source)
    }

    pub fn duplicate_file(path: &str) -> Self {
        Self::new(WalErrorCode::AeroWalDuplicateFile, "rotated WAL file already exists")
            .with_details(format!("file: {}", path))
    }

    pub fn protocol_violation(message: impl Into<String>) -> Self {
        Self::new(WalErrorCode::AeroWalProtocolViolation, message)
    }

    pub fn rotate_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(WalErrorCode::AeroWalRotateFailed, message).with_source(source)
    }

    pub fn not_running() -> Self {
        Self::new(WalErrorCode::AeroWalNotRunning, "WAL manager is not running")
    }

    pub fn backpressure(pending: usize, capacity: usize) -> Self {
        Self::new(WalErrorCode::AeroWalBackpressure, "submission queue is full")
            .with_details(format!("pending: {}, capacity: {}", pending, capacity))
    }

    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(WalErrorCode::AeroWalIo, message).with_source(source)
    }

    /// Returns the error code
    pub fn code(&self) -> WalErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error requires process termination
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for WalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for WalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for WAL operations
pub type WalResult<T> = Result<T, WalError>;
