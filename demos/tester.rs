//! Walk through the public API: async delivery, file rotation, flush policies,
//! directive formatting and the global default logger.
//!
//! Run with `cargo run --example tester`. Writes `log.txt` in the working
//! directory.

use flog::{critical, debug, error, info, trace, warn, LoggerManager, ThreadPool};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> flog::Result<()> {
    let pool = Arc::new(ThreadPool::new(4)?);

    let manager = LoggerManager::global();
    let logger = manager.register_logger("ExampleLogger")?;

    logger.enable_async(&pool)?;
    logger.enable_file_logging("log.txt", 5 * 1024 * 1024)?;
    logger.set_periodic_flush(Duration::from_secs(3))?;
    logger.set_backtrace_threshold(5);

    trace!(logger, "Trace level log.")?;
    debug!(logger, "Debug level log with number: {}", 42)?;
    info!(logger, "Info level log: {0} is the current value of {1}", 13, 10)?;
    warn!(logger, "Warning log: Low disk space.")?;
    error!(logger, "Error log: Failed to load configuration.")?;
    critical!(logger, "Critical log: System failure imminent!")?;

    info!(logger, "This will be logged to the file.")?;
    for i in 0..1000 {
        info!(logger, "Logging to file: {}", i)?;
        thread::sleep(Duration::from_millis(1));
    }

    let pi = std::f64::consts::PI;
    let number = 255;
    info!(logger, "Fixed notation: {.3}", pi)?;
    info!(logger, "Scientific notation: {.3e}", pi)?;
    info!(logger, "Binary format: {b}", number)?;
    info!(logger, "Hexadecimal format: {X}", number)?;

    flog::trace("Using default logger trace.", &[])?;
    flog::debug("Using default logger debug with value: {}", &[123.into()])?;
    flog::info("Using default logger info: {}", &["message".into()])?;

    flog::shutdown()?;

    let metrics = logger.metrics();
    println!(
        "delivered {} record(s), dropped {}, {} threshold flush(es)",
        metrics.delivered_count(),
        metrics.dropped_count(),
        metrics.threshold_flush_count()
    );
    Ok(())
}
