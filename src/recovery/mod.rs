//! Recovery
//!
//! Rebuilds catalog state from the log after a restart or on a replica.
//!
//! # Phases
//!
//! 1. Backward scan from the newest entry to the most recent checkpoint
//! 2. Keep scanning while entries are newer than the checkpoint watermark
//! 3. Reverse, then apply each entry as a replay transaction carrying its
//!    original transaction id and commit timestamp
//!
//! # Invariants
//!
//! - Replay candidates are exactly the entries with
//!   `commit_ts > max_checkpoint_ts`
//! - Replaying the same log twice yields identical catalog timestamps
//! - A writable node never starts from a non-empty log without checkpoint

mod errors;
mod replay;
mod scan;
mod startup;

pub use errors::{RecoveryError, RecoveryErrorCode, RecoveryResult, Severity};
pub use replay::{ReplayOptions, ReplayStats, WalReplayer};
pub use scan::{collect_wal_entries, plan_replay, ReplayCursor, ReplayPlan};
pub use startup::{RecoveryManager, RecoveryReport};
