//! Crash injection at durability-critical points
//!
//! Set `AEROWAL_CRASH_POINT=<name>` and the process aborts the moment
//! execution reaches that point: no unwinding, no flushing, no cleanup.
//! Crash tests then reopen the directory and check what recovery sees.
//!
//! ```bash
//! AEROWAL_CRASH_POINT=replay_before_commit aerowal replay --config aerowal.json
//! ```

use std::sync::OnceLock;

static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn configured() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var("AEROWAL_CRASH_POINT").ok())
        .as_deref()
}

#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    configured() == Some(name)
}

/// Abort the process if `name` is the configured crash point.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

pub mod points {
    /// Before an entry's bytes reach the active file
    pub const WAL_BEFORE_APPEND: &str = "wal_before_append";
    /// Entry bytes written, not yet flushed
    pub const WAL_AFTER_APPEND: &str = "wal_after_append";
    /// Batch flushed per policy, finalization not yet dispatched
    pub const WAL_AFTER_FLUSH: &str = "wal_after_flush";
    /// Active file about to be renamed
    pub const WAL_BEFORE_SWAP: &str = "wal_before_swap";
    /// Rotated file renamed and new active file open
    pub const WAL_AFTER_SWAP: &str = "wal_after_swap";
    /// Checkpoint transaction committed, watermark not yet advanced
    pub const CHECKPOINT_BEFORE_WATERMARK: &str = "checkpoint_before_watermark";
    /// Entries replayed, last replay transaction not yet committed
    pub const REPLAY_BEFORE_COMMIT: &str = "replay_before_commit";

    pub fn all() -> &'static [&'static str] {
        &[
            WAL_BEFORE_APPEND,
            WAL_AFTER_APPEND,
            WAL_AFTER_FLUSH,
            WAL_BEFORE_SWAP,
            WAL_AFTER_SWAP,
            CHECKPOINT_BEFORE_WATERMARK,
            REPLAY_BEFORE_COMMIT,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_point_is_disabled() {
        assert!(!crash_point_enabled("not_a_point"));
        maybe_crash("not_a_point");
    }

    #[test]
    fn test_point_names_unique_and_snake_case() {
        let all = points::all();
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
        for point in all {
            assert!(point.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
