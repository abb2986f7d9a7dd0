//! Progress tracking for long-running record streams.
//!
//! Each pipeline stage owns a [`ProgressTracker`]; the mark stage runs on its own thread,
//! so the counter is atomic and the tracker can be shared by reference.

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

/// Logs a line each time the running count crosses a multiple of the interval.
///
/// # Example
/// ```
/// use umirescue_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Tagged records").with_interval(100);
/// for _ in 0..250 {
///     tracker.log_if_needed(1); // logs at 100 and 200
/// }
/// tracker.log_final(); // logs "Tagged records 250 (complete)"
/// assert_eq!(tracker.count(), 250);
/// ```
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Creates a tracker with a default interval of 1,000,000.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: 1_000_000, message: message.into(), count: AtomicU64::new(0) }
    }

    /// Sets the logging interval. An interval of zero is treated as one.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds `additional` to the count, logging once per interval boundary crossed.
    ///
    /// Returns `true` when the new count sits exactly on a boundary.
    pub fn log_if_needed(&self, additional: u64) -> bool {
        let prev = self.count.fetch_add(additional, Ordering::Relaxed);
        let now = prev + additional;

        for milestone in (prev / self.interval + 1)..=(now / self.interval) {
            info!("{} {}", self.message, milestone * self.interval);
        }

        now > 0 && now % self.interval == 0
    }

    /// Logs the final count unless it was already logged on a boundary.
    pub fn log_final(&self) {
        let count = self.count();
        if count > 0 && count % self.interval != 0 {
            info!("{} {} (complete)", self.message, count);
        }
    }

    /// Current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tracker = ProgressTracker::new("Records");
        assert_eq!(tracker.interval, 1_000_000);
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let tracker = ProgressTracker::new("Records").with_interval(0);
        assert_eq!(tracker.interval, 1);
        assert!(tracker.log_if_needed(3));
    }

    #[test]
    fn test_log_if_needed_reports_boundaries() {
        let tracker = ProgressTracker::new("Records").with_interval(10);
        assert!(!tracker.log_if_needed(5));
        assert!(tracker.log_if_needed(5));
        assert!(tracker.log_if_needed(0));
        assert!(!tracker.log_if_needed(25));
        assert_eq!(tracker.count(), 35);
        tracker.log_final();
    }

    #[test]
    fn test_shared_between_threads() {
        let tracker = ProgressTracker::new("Records").with_interval(1000);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..250 {
                        tracker.log_if_needed(1);
                    }
                });
            }
        });
        assert_eq!(tracker.count(), 1000);
    }
}
