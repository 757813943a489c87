//! Observable events of the WAL engine
//!
//! Events are explicit and typed; the logger only ever sees `as_str()`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Manager lifecycle
    WalManagerStart,
    WalManagerStop,

    // Flush path
    /// A batch was written and flushed
    WalFlushBatch,
    /// The flush thread woke to an empty batch
    WalEmptyBatch,
    /// A transaction carried no commands and was not written
    WalSkipEmptyEntry,
    /// Active file rotated
    WalSwap,
    /// Rotation triggered by the size threshold
    WalSizeThresholdSwap,
    /// Size-threshold rotation failed and will be retried
    WalSwapFailed,
    /// Partial record at the end of a file was ignored
    WalTornTail,
    /// Rotated file removed after a checkpoint covered it
    WalFilePurged,
    /// Decoding failed where a whole record was required
    WalCorruption,
    /// A commit-state update would have moved backward
    WalCommitStateRegression,
    /// Submission rejected by a full queue or a stopped manager
    WalSubmissionRejected,
    /// Follower appended logs shipped by the leader
    WalReplicatedLogsApplied,
    /// Unrecoverable error on the flush thread
    WalFatal,
    /// Work still queued when a fatal error stopped the flush thread
    WalPendingAbandoned,
    /// The flush thread panicked instead of exiting
    WalFlushThreadPanicked,

    // Commit finalization
    FinalizerSpawnFailed,
    FinalizerUnavailable,

    // Checkpoint
    CheckpointStart,
    CheckpointComplete,
    CheckpointFailed,
    /// Another checkpoint holds the gate
    CheckpointSkipped,

    // Recovery
    RecoveryStart,
    /// Checkpoint located and replay candidates collected
    RecoveryScanComplete,
    /// Log has no checkpoint
    RecoveryNoCheckpoint,
    RecoveryReplayBegin,
    RecoveryReplayCommand,
    RecoveryReplayComplete,
    /// Chunk named by a dump-index command was already removed
    RecoveryMissingChunk,
    RecoveryFailed,

    // Background tasks
    BgTaskComplete,
    CleanupComplete,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::WalManagerStart => "WAL_MANAGER_START",
            Event::WalManagerStop => "WAL_MANAGER_STOP",

            Event::WalFlushBatch => "WAL_FLUSH_BATCH",
            Event::WalEmptyBatch => "WAL_EMPTY_BATCH",
            Event::WalSkipEmptyEntry => "WAL_SKIP_EMPTY_ENTRY",
            Event::WalSwap => "WAL_SWAP",
            Event::WalSizeThresholdSwap => "WAL_SIZE_THRESHOLD_SWAP",
            Event::WalSwapFailed => "WAL_SWAP_FAILED",
            Event::WalTornTail => "WAL_TORN_TAIL",
            Event::WalFilePurged => "WAL_FILE_PURGED",
            Event::WalCorruption => "WAL_CORRUPTION",
            Event::WalCommitStateRegression => "WAL_COMMIT_STATE_REGRESSION",
            Event::WalSubmissionRejected => "WAL_SUBMISSION_REJECTED",
            Event::WalReplicatedLogsApplied => "WAL_REPLICATED_LOGS_APPLIED",
            Event::WalFatal => "WAL_FATAL",
            Event::WalPendingAbandoned => "WAL_PENDING_ABANDONED",
            Event::WalFlushThreadPanicked => "WAL_FLUSH_THREAD_PANICKED",

            Event::FinalizerSpawnFailed => "FINALIZER_SPAWN_FAILED",
            Event::FinalizerUnavailable => "FINALIZER_UNAVAILABLE",

            Event::CheckpointStart => "CHECKPOINT_BEGIN",
            Event::CheckpointComplete => "CHECKPOINT_COMPLETE",
            Event::CheckpointFailed => "CHECKPOINT_FAILED",
            Event::CheckpointSkipped => "CHECKPOINT_SKIPPED",

            Event::RecoveryStart => "RECOVERY_BEGIN",
            Event::RecoveryScanComplete => "WAL_REPLAY_SCAN_COMPLETE",
            Event::RecoveryNoCheckpoint => "WAL_REPLAY_NO_CHECKPOINT",
            Event::RecoveryReplayBegin => "WAL_REPLAY_BEGIN",
            Event::RecoveryReplayCommand => "WAL_REPLAY_COMMAND",
            Event::RecoveryReplayComplete => "WAL_REPLAY_COMPLETE",
            Event::RecoveryMissingChunk => "WAL_REPLAY_MISSING_CHUNK",
            Event::RecoveryFailed => "RECOVERY_FAILED",

            Event::BgTaskComplete => "BG_TASK_COMPLETE",
            Event::CleanupComplete => "CLEANUP_COMPLETE",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Event::WalCorruption | Event::WalFatal | Event::RecoveryFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
