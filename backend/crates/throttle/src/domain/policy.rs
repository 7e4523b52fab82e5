//! Throttle Policy Value Object

use std::time::Duration;

/// Thresholds for one protected operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Count at which the pair is blocked
    pub max_failures: u32,
    /// Counting window; starts at the first event, never extended
    pub window: Duration,
    /// Block duration once the threshold is crossed
    pub block: Duration,
}

impl Policy {
    pub const fn new(max_failures: u32, window_secs: u64, block_secs: u64) -> Self {
        Self {
            max_failures,
            window: Duration::from_secs(window_secs),
            block: Duration::from_secs(block_secs),
        }
    }

    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }

    pub fn block_secs(&self) -> u64 {
        self.block.as_secs()
    }
}
