use std::time::{Duration, Instant};

/// Keeps track of how long some operation has been running.
pub struct Timer {
    start_time: Instant,
}

impl Timer {
    /// Create a new `Timer` starting now.
    pub fn now() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Reset internal timer to now.
    pub fn reset(&mut self) {
        self.start_time = Instant::now();
    }

    /// Time since the timer was last reset.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
