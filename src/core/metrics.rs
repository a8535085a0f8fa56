//! Logger metrics for observability
//!
//! Counters for monitoring dispatch health: entries delivered, entries
//! rejected by the severity gate, and sink failures during fan-out.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for logger observability
///
/// # Example
///
/// ```
/// use ldgr::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
///
/// metrics.record_logged();
/// metrics.record_filtered();
/// metrics.record_sink_failure();
///
/// assert_eq!(metrics.total_logged(), 1);
/// assert_eq!(metrics.filtered_count(), 1);
/// assert_eq!(metrics.sink_failures(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Entries that passed the gate and were fanned out
    total_logged: AtomicU64,

    /// Entries rejected by the logger's severity gate
    filtered: AtomicU64,

    /// Sink calls that returned an error or panicked
    sink_failures: AtomicU64,
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            total_logged: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn total_logged(&self) -> u64 {
        self.total_logged.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn filtered_count(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_logged(&self) -> u64 {
        self.total_logged.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_filtered(&self) -> u64 {
        self.filtered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_failure(&self) -> u64 {
        self.sink_failures.fetch_add(1, Ordering::Relaxed)
    }

    /// Sink failures per delivered entry, as a percentage (0.0 - 100.0+)
    ///
    /// Returns 0.0 if nothing has been logged.
    pub fn failure_rate(&self) -> f64 {
        let logged = self.total_logged() as f64;
        if logged == 0.0 {
            0.0
        } else {
            (self.sink_failures() as f64 / logged) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.total_logged.store(0, Ordering::Relaxed);
        self.filtered.store(0, Ordering::Relaxed);
        self.sink_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            total_logged: AtomicU64::new(self.total_logged()),
            filtered: AtomicU64::new(self.filtered_count()),
            sink_failures: AtomicU64::new(self.sink_failures()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.total_logged(), 0);
        assert_eq!(metrics.filtered_count(), 0);
        assert_eq!(metrics.sink_failures(), 0);
    }

    #[test]
    fn test_record_returns_previous() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.record_filtered(), 0);
        assert_eq!(metrics.record_filtered(), 1);
        assert_eq!(metrics.filtered_count(), 2);
    }

    #[test]
    fn test_failure_rate() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.failure_rate(), 0.0);

        for _ in 0..40 {
            metrics.record_logged();
        }
        for _ in 0..10 {
            metrics.record_sink_failure();
        }
        let rate = metrics.failure_rate();
        assert!((24.9..=25.1).contains(&rate), "Failure rate was {}", rate);
    }

    #[test]
    fn test_reset_and_clone() {
        let metrics = LoggerMetrics::new();
        metrics.record_logged();
        metrics.record_sink_failure();

        let snapshot = metrics.clone();
        metrics.reset();

        assert_eq!(metrics.total_logged(), 0);
        assert_eq!(snapshot.total_logged(), 1);
        assert_eq!(snapshot.sink_failures(), 1);
    }
}
