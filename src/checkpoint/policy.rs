/// Decides when enough log has accumulated to warrant a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointPolicy {
    interval_bytes: u64,
}

impl CheckpointPolicy {
    pub fn new(interval_bytes: u64) -> Self {
        Self { interval_bytes }
    }

    pub fn interval_bytes(&self) -> u64 {
        self.interval_bytes
    }

    /// True once `current_wal_size` is at least one interval past the size
    /// recorded by the last checkpoint. A size below the recorded one (the
    /// manager restarted and its counter began again) never triggers.
    pub fn should_checkpoint(&self, current_wal_size: u64, last_ckp_wal_size: u64) -> bool {
        current_wal_size
            .checked_sub(last_ckp_wal_size)
            .is_some_and(|grown| grown >= self.interval_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_threshold() {
        let p = CheckpointPolicy::new(100);
        assert!(!p.should_checkpoint(99, 0));
        assert!(p.should_checkpoint(100, 0));
        assert!(!p.should_checkpoint(150, 100));
        assert!(p.should_checkpoint(250, 100));
    }

    #[test]
    fn test_counter_reset_does_not_trigger() {
        let p = CheckpointPolicy::new(10);
        assert!(!p.should_checkpoint(5, 1_000));
    }
}
