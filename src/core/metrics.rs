//! Logger metrics for observability
//!
//! Sink failures on worker threads are recorded here rather than thrown back
//! at the caller, so these counters are how an application notices them.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-logger counters.
///
/// # Example
///
/// ```
/// use flog::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_delivered();
/// metrics.record_dropped();
///
/// assert_eq!(metrics.delivered_count(), 1);
/// assert_eq!(metrics.dropped_count(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Records handed to the sinks
    delivered: AtomicU64,

    /// Records accepted but never delivered (shutdown timeout, closed sinks)
    dropped: AtomicU64,

    /// Individual sink write/flush failures
    sink_errors: AtomicU64,

    /// Flushes forced by the backtrace threshold
    threshold_flushes: AtomicU64,

    /// Flushes fired by the periodic timer
    periodic_flushes: AtomicU64,
}

impl LoggerMetrics {
    pub const fn new() -> Self {
        Self {
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            sink_errors: AtomicU64::new(0),
            threshold_flushes: AtomicU64::new(0),
            periodic_flushes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_error_count(&self) -> u64 {
        self.sink_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn threshold_flush_count(&self) -> u64 {
        self.threshold_flushes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn periodic_flush_count(&self) -> u64 {
        self.periodic_flushes.load(Ordering::Relaxed)
    }

    /// Returns the previous value
    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the previous value
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_error(&self) -> u64 {
        self.sink_errors.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_threshold_flush(&self) -> u64 {
        self.threshold_flushes.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_periodic_flush(&self) -> u64 {
        self.periodic_flushes.fetch_add(1, Ordering::Relaxed)
    }

    /// Dropped share of all accepted records, as a percentage (0.0 - 100.0)
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let total = self.delivered_count() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Snapshot of the current values
    fn clone(&self) -> Self {
        Self {
            delivered: AtomicU64::new(self.delivered_count()),
            dropped: AtomicU64::new(self.dropped_count()),
            sink_errors: AtomicU64::new(self.sink_error_count()),
            threshold_flushes: AtomicU64::new(self.threshold_flush_count()),
            periodic_flushes: AtomicU64::new(self.periodic_flush_count()),
        }
    }
}
