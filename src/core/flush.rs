//! Periodic flush timer

use super::dispatch::SinkSet;
use crossbeam_channel::{bounded, select, tick, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background thread flushing one logger's sinks on every interval tick.
///
/// Cancellation is synchronous: once [`cancel`](Self::cancel) returns the
/// timer has stopped and will not fire again.
pub(crate) struct PeriodicFlush {
    interval: Duration,
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicFlush {
    pub(crate) fn start(logger: &str, interval: Duration, sinks: Arc<SinkSet>) -> std::io::Result<Self> {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let ticker = tick(interval);

        let handle = thread::Builder::new()
            .name(format!("flog-flush-{}", logger))
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => {
                        if let Err(e) = sinks.periodic_flush() {
                            eprintln!("[FLOG ERROR] Periodic flush failed: {}", e);
                        }
                    }
                    // Fires on an explicit cancel or when the sender is dropped
                    recv(cancel_rx) -> _ => break,
                }
            })?;

        Ok(Self {
            interval,
            cancel: Some(cancel_tx),
            handle: Some(handle),
        })
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the timer and wait for its thread. Idempotent.
    pub(crate) fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                eprintln!("[FLOG ERROR] Periodic flush thread panicked");
            }
        }
    }
}

impl Drop for PeriodicFlush {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Result;
    use crate::core::log_record::LogRecord;
    use crate::core::metrics::LoggerMetrics;
    use crate::core::sink::Sink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlushCounter(Arc<AtomicUsize>);

    impl Sink for FlushCounter {
        fn write(&mut self, _record: &LogRecord) -> Result<()> {
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "flush-counter"
        }
    }

    #[test]
    fn test_ticks_then_stops_after_cancel() {
        let flushes = Arc::new(AtomicUsize::new(0));
        let metrics = Arc::new(LoggerMetrics::new());
        let sinks = Arc::new(SinkSet::new(
            vec![Box::new(FlushCounter(Arc::clone(&flushes)))],
            Arc::clone(&metrics),
        ));

        let mut timer = PeriodicFlush::start("test", Duration::from_millis(10), sinks).unwrap();
        assert_eq!(timer.interval(), Duration::from_millis(10));
        thread::sleep(Duration::from_millis(100));
        timer.cancel();

        let after_cancel = flushes.load(Ordering::SeqCst);
        assert!(after_cancel >= 2, "only {} flushes", after_cancel);
        assert_eq!(metrics.periodic_flush_count() as usize, after_cancel);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(flushes.load(Ordering::SeqCst), after_cancel);

        // Idempotent
        timer.cancel();
    }
}
