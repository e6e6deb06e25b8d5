//! Per-resource error backoff.
//!
//! Delays follow the Fibonacci sequence scaled by a minimum, so retries stay
//! frequent for a few attempts and then spread out. With the controller's
//! bounds: 5s, 5s, 10s, 15s, 25s, 40s, 65s, ... until the 300s ceiling.

use std::time::Duration;

/// Fibonacci backoff, in whole seconds
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    prev_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Starts at `min_secs`; never returns more than `max_secs`
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            prev_secs: 0,
            current_secs: min_secs.min(max_secs),
            max_secs,
        }
    }

    /// Returns the delay for this attempt and advances to the next one
    pub fn next_backoff(&mut self) -> Duration {
        let delay = self.current_secs;
        let next = self.prev_secs.saturating_add(self.current_secs).min(self.max_secs);
        self.prev_secs = self.current_secs;
        self.current_secs = next;
        Duration::from_secs(delay)
    }
}
