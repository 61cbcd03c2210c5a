//! Record fan-out to a logger's sinks, and pending-record accounting
//!
//! [`SinkSet`] is the single-writer point for one logger's sinks: the caller
//! thread (sync mode), a pool worker (async mode) and the periodic flush timer
//! all go through its mutex. [`Pending`] counts records accepted for async
//! delivery that have not reached the sinks yet.

use super::{
    error::{LoggerError, Result},
    log_record::LogRecord,
    metrics::LoggerMetrics,
    sink::Sink,
};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Run one sink operation with panic isolation, folding a panic into an error.
fn guarded<F>(sink: &mut Box<dyn Sink>, op: F) -> Result<()>
where
    F: FnOnce(&mut Box<dyn Sink>) -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| op(&mut *sink))) {
        Ok(result) => result,
        Err(payload) => Err(LoggerError::sink_write(
            sink.name().to_string(),
            format!("panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}

struct SinkSetState {
    sinks: Vec<Box<dyn Sink>>,
    since_flush: u32,
    closed: bool,
}

pub(crate) struct SinkSet {
    state: Mutex<SinkSetState>,
    backtrace_threshold: AtomicU32,
    metrics: Arc<LoggerMetrics>,
}

impl SinkSet {
    pub(crate) fn new(sinks: Vec<Box<dyn Sink>>, metrics: Arc<LoggerMetrics>) -> Self {
        Self {
            state: Mutex::new(SinkSetState {
                sinks,
                since_flush: 0,
                closed: false,
            }),
            backtrace_threshold: AtomicU32::new(0),
            metrics,
        }
    }

    pub(crate) fn push(&self, sink: Box<dyn Sink>) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(LoggerError::other("cannot attach a sink to a closed logger"));
        }
        state.sinks.push(sink);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().sinks.len()
    }

    pub(crate) fn set_backtrace_threshold(&self, count: u32) {
        self.backtrace_threshold.store(count, Ordering::Relaxed);
    }

    pub(crate) fn backtrace_threshold(&self) -> u32 {
        self.backtrace_threshold.load(Ordering::Relaxed)
    }

    /// Write `record` to every sink in attachment order.
    ///
    /// Every sink is attempted; the first failure is returned. Once the
    /// number of records since the last flush reaches the backtrace
    /// threshold, all sinks are flushed and the window restarts.
    pub(crate) fn deliver(&self, record: &LogRecord) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            self.metrics.record_dropped();
            return Ok(());
        }

        let mut first_error = None;
        let mut accepted = 0usize;
        for sink in state.sinks.iter_mut() {
            match guarded(sink, |s| s.write(record)) {
                Ok(()) => accepted += 1,
                Err(e) => {
                    self.metrics.record_sink_error();
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        eprintln!("[FLOG ERROR] Sink '{}' failed: {}", sink.name(), e);
                    }
                }
            }
        }
        // A record no sink accepted is lost, not delivered
        if accepted > 0 || state.sinks.is_empty() {
            self.metrics.record_delivered();
        } else {
            self.metrics.record_dropped();
        }

        let threshold = self.backtrace_threshold();
        if threshold == 0 {
            return first_error.map_or(Ok(()), Err);
        }
        state.since_flush = state.since_flush.saturating_add(1);
        if state.since_flush >= threshold {
            self.metrics.record_threshold_flush();
            if let Err(e) = Self::flush_locked(&mut state, &self.metrics) {
                eprintln!("[FLOG ERROR] Threshold flush failed: {}", e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn flush_locked(state: &mut SinkSetState, metrics: &LoggerMetrics) -> Result<()> {
        state.since_flush = 0;
        let mut first_error = None;
        for sink in state.sinks.iter_mut() {
            if let Err(e) = guarded(sink, |s| s.flush()) {
                metrics.record_sink_error();
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub(crate) fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        Self::flush_locked(&mut state, &self.metrics)
    }

    /// Timer-driven flush. Skipped once closed.
    pub(crate) fn periodic_flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        self.metrics.record_periodic_flush();
        Self::flush_locked(&mut state, &self.metrics)
    }

    /// Flush and release every sink. Later deliveries count as dropped.
    /// Returns `false` if the set was already closed.
    pub(crate) fn close(&self) -> (bool, Result<()>) {
        let mut state = self.state.lock();
        if state.closed {
            return (false, Ok(()));
        }
        let result = Self::flush_locked(&mut state, &self.metrics);
        state.sinks.clear();
        state.closed = true;
        (true, result)
    }
}

/// Count of accepted-but-undelivered async records.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    count: Mutex<u64>,
    idle: Condvar,
}

impl Pending {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn count(&self) -> u64 {
        *self.count.lock()
    }

    /// Register one record. The ticket releases it when dropped.
    pub(crate) fn ticket(self: &Arc<Self>, metrics: &Arc<LoggerMetrics>) -> PendingTicket {
        *self.count.lock() += 1;
        PendingTicket {
            pending: Arc::clone(self),
            metrics: Arc::clone(metrics),
            completed: false,
        }
    }

    fn release(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    /// Wait until nothing is pending. Returns `false` on timeout.
    pub(crate) fn wait_idle(&self, deadline: Option<Instant>) -> bool {
        let mut count = self.count.lock();
        while *count > 0 {
            match deadline {
                Some(deadline) => {
                    if self.idle.wait_until(&mut count, deadline).timed_out() {
                        return *count == 0;
                    }
                }
                None => self.idle.wait(&mut count),
            }
        }
        true
    }

    #[cfg(test)]
    pub(crate) fn wait_idle_for(&self, timeout: std::time::Duration) -> bool {
        self.wait_idle(Some(Instant::now() + timeout))
    }
}

/// Held by an async delivery task. A ticket dropped without [`complete`]
/// (task discarded by a pool shutdown, or rejected at submit) counts its
/// record as dropped.
///
/// [`complete`]: PendingTicket::complete
pub(crate) struct PendingTicket {
    pending: Arc<Pending>,
    metrics: Arc<LoggerMetrics>,
    completed: bool,
}

impl PendingTicket {
    pub(crate) fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for PendingTicket {
    fn drop(&mut self) {
        if !self.completed {
            self.metrics.record_dropped();
        }
        self.pending.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_level::LogLevel;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct Counters {
        writes: AtomicUsize,
        flushes: AtomicUsize,
    }

    struct CountingSink(Arc<Counters>);

    impl Sink for CountingSink {
        fn write(&mut self, _record: &LogRecord) -> Result<()> {
            self.0.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            self.0.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn write(&mut self, _record: &LogRecord) -> Result<()> {
            Err(LoggerError::sink_write("failing", "disk gone"))
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct PanickingSink;

    impl Sink for PanickingSink {
        fn write(&mut self, _record: &LogRecord) -> Result<()> {
            panic!("sink exploded");
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    fn record() -> LogRecord {
        LogRecord::new(LogLevel::Info, Arc::from("test"), "hello".to_string())
    }

    #[test]
    fn test_fan_out_continues_after_failure() {
        let counters = Arc::new(Counters::default());
        let metrics = Arc::new(LoggerMetrics::new());
        let set = SinkSet::new(
            vec![
                Box::new(FailingSink),
                Box::new(PanickingSink),
                Box::new(CountingSink(Arc::clone(&counters))),
            ],
            Arc::clone(&metrics),
        );

        let err = set.deliver(&record()).unwrap_err();
        assert!(err.to_string().contains("disk gone"));
        assert_eq!(counters.writes.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.sink_error_count(), 2);
        assert_eq!(metrics.delivered_count(), 1);
    }

    #[test]
    fn test_record_rejected_by_every_sink_counts_as_dropped() {
        let metrics = Arc::new(LoggerMetrics::new());
        let set = SinkSet::new(
            vec![Box::new(FailingSink), Box::new(PanickingSink)],
            Arc::clone(&metrics),
        );

        assert!(set.deliver(&record()).is_err());
        assert_eq!(metrics.delivered_count(), 0);
        assert_eq!(metrics.dropped_count(), 1);
        assert_eq!(metrics.sink_error_count(), 2);
    }

    #[test]
    fn test_no_threshold_leaves_window_counter_alone() {
        let counters = Arc::new(Counters::default());
        let metrics = Arc::new(LoggerMetrics::new());
        let set = SinkSet::new(
            vec![Box::new(CountingSink(Arc::clone(&counters)))],
            Arc::clone(&metrics),
        );
        set.state.lock().since_flush = u32::MAX;

        set.deliver(&record()).unwrap();
        assert_eq!(set.state.lock().since_flush, u32::MAX);

        // Enabling a threshold later saturates instead of wrapping
        set.set_backtrace_threshold(5);
        set.deliver(&record()).unwrap();
        assert_eq!(counters.flushes.load(Ordering::SeqCst), 1);
        assert_eq!(set.state.lock().since_flush, 0);
    }

    #[test]
    fn test_threshold_flush_once_per_window() {
        let counters = Arc::new(Counters::default());
        let metrics = Arc::new(LoggerMetrics::new());
        let set = SinkSet::new(
            vec![Box::new(CountingSink(Arc::clone(&counters)))],
            Arc::clone(&metrics),
        );
        set.set_backtrace_threshold(3);

        for _ in 0..7 {
            set.deliver(&record()).unwrap();
        }
        assert_eq!(counters.flushes.load(Ordering::SeqCst), 2);
        assert_eq!(metrics.threshold_flush_count(), 2);

        // An explicit flush restarts the window
        set.flush().unwrap();
        set.deliver(&record()).unwrap();
        set.deliver(&record()).unwrap();
        assert_eq!(counters.flushes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_close_is_idempotent_and_drops_late_records() {
        let counters = Arc::new(Counters::default());
        let metrics = Arc::new(LoggerMetrics::new());
        let set = SinkSet::new(
            vec![Box::new(CountingSink(Arc::clone(&counters)))],
            Arc::clone(&metrics),
        );

        let (first, result) = set.close();
        assert!(first);
        assert!(result.is_ok());
        let (second, _) = set.close();
        assert!(!second);
        assert_eq!(counters.flushes.load(Ordering::SeqCst), 1);
        assert_eq!(set.len(), 0);

        set.deliver(&record()).unwrap();
        assert_eq!(metrics.dropped_count(), 1);
        assert!(set.push(Box::new(FailingSink)).is_err());
    }

    #[test]
    fn test_pending_tickets() {
        let pending = Arc::new(Pending::new());
        let metrics = Arc::new(LoggerMetrics::new());

        let done = pending.ticket(&metrics);
        let abandoned = pending.ticket(&metrics);
        assert_eq!(pending.count(), 2);
        assert!(!pending.wait_idle_for(Duration::from_millis(10)));

        done.complete();
        drop(abandoned);
        assert_eq!(pending.count(), 0);
        assert_eq!(metrics.dropped_count(), 1);
        assert!(pending.wait_idle_for(Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_idle_wakes_on_release() {
        let pending = Arc::new(Pending::new());
        let metrics = Arc::new(LoggerMetrics::new());
        let ticket = pending.ticket(&metrics);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            ticket.complete();
        });

        assert!(pending.wait_idle_for(Duration::from_secs(5)));
        handle.join().unwrap();
    }
}
