//! Main logger implementation

use super::{
    config::FileSinkConfig,
    dispatch::{Pending, SinkSet},
    error::{LoggerError, Result},
    flush::PeriodicFlush,
    log_level::LogLevel,
    log_record::LogRecord,
    metrics::LoggerMetrics,
    sink::Sink,
    thread_pool::{Lane, ThreadPool},
    timestamp::TimestampFormat,
};
use crate::format::{FormatArgument, TemplateCache};
use crate::sinks::{ConsoleSink, ConsoleTarget};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of a logger. Only `Active` loggers accept records; the other
/// states turn every log call into a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    Active,
    /// Shutdown has begun; queued records are still being delivered
    Draining,
    /// Sinks flushed and released
    Closed,
}

struct LoggerInner {
    name: Arc<str>,
    min_level: RwLock<LogLevel>,
    state: RwLock<LoggerState>,
    sinks: Arc<SinkSet>,
    /// `Some` once async delivery is enabled
    dispatch: RwLock<Option<Lane>>,
    pending: Arc<Pending>,
    metrics: Arc<LoggerMetrics>,
    periodic: Mutex<Option<PeriodicFlush>>,
    templates: Arc<TemplateCache>,
    timestamp_format: TimestampFormat,
}

impl Drop for LoggerInner {
    fn drop(&mut self) {
        if let Some(mut timer) = self.periodic.get_mut().take() {
            timer.cancel();
        }
        if let Err(e) = self.sinks.flush() {
            eprintln!("[FLOG ERROR] Failed to flush logger '{}' on drop: {}", self.name, e);
        }
    }
}

/// Named, leveled logger.
///
/// `Logger` is a cheap handle; clones share the same sinks, level and
/// dispatch mode. Each log call checks the level first, so filtered records
/// cost no formatting.
///
/// # Example
///
/// ```
/// use flog::{Logger, LogLevel};
///
/// let logger = Logger::builder("payments")
///     .min_level(LogLevel::Info)
///     .console(flog::sinks::ConsoleTarget::Stderr)
///     .build()
///     .unwrap();
///
/// logger.info("charged {} cents to account {X}", &[1250.into(), 48879.into()]).unwrap();
/// logger.debug("filtered out", &[]).unwrap();
/// ```
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    /// Logger writing to stdout, accepting every level.
    pub fn new(name: impl Into<String>) -> Self {
        let sink: Box<dyn Sink> = Box::new(ConsoleSink::new());
        Self::from_parts(
            name.into(),
            LogLevel::default(),
            vec![sink],
            Arc::new(TemplateCache::new()),
            TimestampFormat::default(),
        )
    }

    /// Builder with no sinks attached
    #[must_use]
    pub fn builder(name: impl Into<String>) -> LoggerBuilder {
        LoggerBuilder::new(name)
    }

    fn from_parts(
        name: String,
        min_level: LogLevel,
        sinks: Vec<Box<dyn Sink>>,
        templates: Arc<TemplateCache>,
        timestamp_format: TimestampFormat,
    ) -> Self {
        let metrics = Arc::new(LoggerMetrics::new());
        Self {
            inner: Arc::new(LoggerInner {
                name: Arc::from(name),
                min_level: RwLock::new(min_level),
                state: RwLock::new(LoggerState::Active),
                sinks: Arc::new(SinkSet::new(sinks, Arc::clone(&metrics))),
                dispatch: RwLock::new(None),
                pending: Arc::new(Pending::new()),
                metrics,
                periodic: Mutex::new(None),
                templates,
                timestamp_format,
            }),
        }
    }

    /// A logger that was never open. Every call on it is a no-op.
    pub(crate) fn closed(name: impl Into<String>) -> Self {
        let logger = Self::from_parts(
            name.into(),
            LogLevel::default(),
            Vec::new(),
            Arc::new(TemplateCache::with_capacity(0)),
            TimestampFormat::default(),
        );
        let _ = logger.inner.sinks.close();
        *logger.inner.state.write() = LoggerState::Closed;
        logger
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn min_level(&self) -> LogLevel {
        *self.inner.min_level.read()
    }

    pub fn set_min_level(&self, level: LogLevel) {
        *self.inner.min_level.write() = level;
    }

    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level()
    }

    pub fn state(&self) -> LoggerState {
        *self.inner.state.read()
    }

    pub fn is_async(&self) -> bool {
        self.inner.dispatch.read().is_some()
    }

    /// Records accepted for async delivery that have not reached the sinks
    pub fn pending(&self) -> u64 {
        self.inner.pending.count()
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.inner.metrics
    }

    pub fn sink_count(&self) -> usize {
        self.inner.sinks.len()
    }

    /// Render `template` with `args` and deliver it at `level`.
    ///
    /// # Errors
    ///
    /// - [`LoggerError::Format`] for a malformed template or mismatched arguments
    /// - the first sink failure, in synchronous mode
    /// - [`LoggerError::PoolClosed`] if the async pool was shut down under
    ///   an active logger
    ///
    /// Records at a level below the minimum, or sent once shutdown has begun,
    /// are ignored and return `Ok(())`.
    pub fn log(&self, level: LogLevel, template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
        if !self.is_enabled(level) || self.state() != LoggerState::Active {
            return Ok(());
        }

        let message = self.inner.templates.get_or_parse(template)?.render(args)?;
        let record = LogRecord::new(level, Arc::clone(&self.inner.name), message);

        // Shutdown takes the write lock, so a record that passes this check
        // is counted before draining starts
        let state = self.inner.state.read();
        if *state != LoggerState::Active {
            return Ok(());
        }
        self.dispatch(record)
    }

    fn dispatch(&self, record: LogRecord) -> Result<()> {
        let dispatch = self.inner.dispatch.read();
        let Some(lane) = dispatch.as_ref() else {
            return self.inner.sinks.deliver(&record);
        };

        let ticket = self.inner.pending.ticket(&self.inner.metrics);
        let sinks = Arc::clone(&self.inner.sinks);
        // A rejected task is dropped with its ticket, which counts the record as dropped
        lane.submit(move || {
            if let Err(e) = sinks.deliver(&record) {
                eprintln!(
                    "[FLOG ERROR] Async delivery for logger '{}' failed: {}; record: {}",
                    record.logger(),
                    e,
                    record.message()
                );
            }
            ticket.complete();
        })
    }

    pub fn trace(&self, template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
        self.log(LogLevel::Trace, template, args)
    }

    pub fn debug(&self, template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
        self.log(LogLevel::Debug, template, args)
    }

    pub fn info(&self, template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
        self.log(LogLevel::Info, template, args)
    }

    pub fn warn(&self, template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
        self.log(LogLevel::Warn, template, args)
    }

    pub fn error(&self, template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
        self.log(LogLevel::Error, template, args)
    }

    pub fn critical(&self, template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
        self.log(LogLevel::Critical, template, args)
    }

    /// Deliver records through `pool` from now on.
    ///
    /// The logger is pinned to one of the pool's workers, so its records
    /// reach the sinks in the order they were logged. Switching pools waits
    /// until everything queued on the previous one has been delivered.
    ///
    /// # Errors
    ///
    /// [`LoggerError::PoolClosed`] if `pool` has already been shut down.
    pub fn enable_async(&self, pool: &Arc<ThreadPool>) -> Result<()> {
        if pool.is_closed() {
            return Err(LoggerError::PoolClosed);
        }
        let mut dispatch = self.inner.dispatch.write();
        if let Some(current) = dispatch.as_ref() {
            if Arc::ptr_eq(current.pool(), pool) {
                return Ok(());
            }
        }
        self.inner.pending.wait_idle(None);
        *dispatch = Some(pool.lane());
        Ok(())
    }

    /// Attach a [`RotatingFileSink`](crate::sinks::RotatingFileSink) at `path`.
    pub fn enable_file_logging<P: AsRef<Path>>(&self, path: P, max_bytes: u64) -> Result<()> {
        let sink = FileSinkConfig::new(path.as_ref(), max_bytes).open(self.inner.timestamp_format.clone())?;
        self.add_sink(sink)
    }

    /// Flush every sink on a fixed interval. A zero interval stops the timer.
    pub fn set_periodic_flush(&self, interval: Duration) -> Result<()> {
        let mut periodic = self.inner.periodic.lock();
        if let Some(mut timer) = periodic.take() {
            timer.cancel();
        }
        if interval.is_zero() || self.state() != LoggerState::Active {
            return Ok(());
        }

        let timer = PeriodicFlush::start(&self.inner.name, interval, Arc::clone(&self.inner.sinks))
            .map_err(|e| {
                LoggerError::io_operation(
                    "starting periodic flush",
                    format!("logger '{}'", self.inner.name),
                    e,
                )
            })?;
        *periodic = Some(timer);
        Ok(())
    }

    pub fn periodic_flush_interval(&self) -> Option<Duration> {
        self.inner.periodic.lock().as_ref().map(PeriodicFlush::interval)
    }

    /// Flush all sinks after every `count` delivered records. Zero disables.
    pub fn set_backtrace_threshold(&self, count: u32) {
        self.inner.sinks.set_backtrace_threshold(count);
    }

    pub fn backtrace_threshold(&self) -> u32 {
        self.inner.sinks.backtrace_threshold()
    }

    /// Append a sink after the existing ones.
    ///
    /// # Errors
    ///
    /// Fails once the logger has closed its sinks.
    pub fn add_sink<S: Sink + 'static>(&self, sink: S) -> Result<()> {
        self.inner.sinks.push(Box::new(sink))
    }

    /// Flush every sink now. Records still queued for async delivery are not
    /// waited for; see [`wait_idle`](Self::wait_idle).
    pub fn flush(&self) -> Result<()> {
        self.inner.sinks.flush()
    }

    /// Wait until no async records are pending. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.inner.pending.wait_idle(Some(Instant::now() + timeout))
    }

    /// Stop this logger: cancel the flush timer, wait up to `timeout` for
    /// queued records, then flush and release the sinks.
    ///
    /// The async pool, if any, is left running since other loggers may share
    /// it. Calls after the first return `Ok(())` immediately.
    ///
    /// # Errors
    ///
    /// [`LoggerError::ShutdownTimeout`] when records were still queued at the
    /// deadline. The logger is closed regardless; those records are counted
    /// as dropped when their tasks run.
    pub fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.cancel_periodic_flush();
        if !self.begin_draining() {
            return Ok(());
        }
        match self.finish_shutdown(Instant::now() + timeout) {
            None => Ok(()),
            Some(dropped) => Err(LoggerError::ShutdownTimeout { loggers: 1, dropped }),
        }
    }

    pub(crate) fn cancel_periodic_flush(&self) {
        if let Some(mut timer) = self.inner.periodic.lock().take() {
            timer.cancel();
        }
    }

    /// Move `Active` to `Draining`. Returns `false` if shutdown already began.
    pub(crate) fn begin_draining(&self) -> bool {
        let mut state = self.inner.state.write();
        if *state != LoggerState::Active {
            return false;
        }
        *state = LoggerState::Draining;
        true
    }

    /// Wait for pending records until `deadline`, then close the sinks.
    /// Returns the number of records still pending if the deadline passed.
    pub(crate) fn finish_shutdown(&self, deadline: Instant) -> Option<u64> {
        let drained = self.inner.pending.wait_idle(Some(deadline));
        let left = self.pending();

        let (_, result) = self.inner.sinks.close();
        if let Err(e) = result {
            eprintln!("[FLOG ERROR] Failed to flush logger '{}' during shutdown: {}", self.name(), e);
        }
        *self.inner.state.write() = LoggerState::Closed;

        if drained {
            None
        } else {
            eprintln!(
                "[FLOG WARN] Logger '{}' did not drain before the shutdown deadline; {} record(s) dropped",
                self.name(),
                left
            );
            Some(left)
        }
    }

    pub(crate) fn pool(&self) -> Option<Arc<ThreadPool>> {
        self.inner.dispatch.read().as_ref().map(|lane| Arc::clone(lane.pool()))
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name())
            .field("min_level", &self.min_level())
            .field("state", &self.state())
            .field("async", &self.is_async())
            .finish()
    }
}

enum SinkSpec {
    Ready(Box<dyn Sink>),
    Console { target: ConsoleTarget, colors: bool },
    File(FileSinkConfig),
}

/// Builder for constructing a [`Logger`] with a fluent API
///
/// Sinks are attached in the order they are added. Fallible steps (opening
/// files, starting the flush timer) run in [`build`](Self::build).
///
/// # Example
///
/// ```no_run
/// use flog::{Logger, LogLevel, ThreadPool};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let pool = Arc::new(ThreadPool::new(2).unwrap());
/// let logger = Logger::builder("worker")
///     .min_level(LogLevel::Debug)
///     .console(flog::sinks::ConsoleTarget::Stdout)
///     .file("/var/log/worker.log", 5 * 1024 * 1024)
///     .async_pool(Arc::clone(&pool))
///     .periodic_flush(Duration::from_secs(1))
///     .backtrace_threshold(100)
///     .build()
///     .unwrap();
/// ```
pub struct LoggerBuilder {
    name: String,
    min_level: LogLevel,
    sinks: Vec<SinkSpec>,
    pool: Option<Arc<ThreadPool>>,
    periodic_flush: Option<Duration>,
    backtrace_threshold: u32,
    timestamp_format: TimestampFormat,
    templates: Option<Arc<TemplateCache>>,
}

impl LoggerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_level: LogLevel::default(),
            sinks: Vec::new(),
            pool: None,
            periodic_flush: None,
            backtrace_threshold: 0,
            timestamp_format: TimestampFormat::default(),
            templates: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(SinkSpec::Ready(Box::new(sink)));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn console(self, target: ConsoleTarget) -> Self {
        self.console_with_colors(target, false)
    }

    #[must_use = "builder methods return a new value"]
    pub fn console_with_colors(mut self, target: ConsoleTarget, colors: bool) -> Self {
        self.sinks.push(SinkSpec::Console { target, colors });
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn file(self, path: impl AsRef<Path>, max_bytes: u64) -> Self {
        self.file_config(FileSinkConfig::new(path.as_ref(), max_bytes))
    }

    #[must_use = "builder methods return a new value"]
    pub fn file_config(mut self, config: FileSinkConfig) -> Self {
        self.sinks.push(SinkSpec::File(config));
        self
    }

    /// Deliver records asynchronously through `pool`
    #[must_use = "builder methods return a new value"]
    pub fn async_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn periodic_flush(mut self, interval: Duration) -> Self {
        self.periodic_flush = Some(interval);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn backtrace_threshold(mut self, count: u32) -> Self {
        self.backtrace_threshold = count;
        self
    }

    /// Timestamp layout for the console and file sinks created by this builder
    #[must_use = "builder methods return a new value"]
    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Share a parsed-template cache with other loggers
    #[must_use = "builder methods return a new value"]
    pub fn template_cache(mut self, cache: Arc<TemplateCache>) -> Self {
        self.templates = Some(cache);
        self
    }

    /// # Errors
    ///
    /// Fails if a file sink cannot be opened, the flush timer cannot start,
    /// or the async pool is already shut down.
    pub fn build(self) -> Result<Logger> {
        let mut sinks: Vec<Box<dyn Sink>> = Vec::with_capacity(self.sinks.len());
        for spec in self.sinks {
            let sink: Box<dyn Sink> = match spec {
                SinkSpec::Ready(sink) => sink,
                SinkSpec::Console { target, colors } => Box::new(
                    ConsoleSink::with_target(target)
                        .with_colors(colors)
                        .with_timestamp_format(self.timestamp_format.clone()),
                ),
                SinkSpec::File(config) => Box::new(config.open(self.timestamp_format.clone())?),
            };
            sinks.push(sink);
        }

        let templates = self.templates.unwrap_or_else(|| Arc::new(TemplateCache::new()));
        let logger = Logger::from_parts(self.name, self.min_level, sinks, templates, self.timestamp_format);

        logger.set_backtrace_threshold(self.backtrace_threshold);
        if let Some(pool) = self.pool {
            logger.enable_async(&pool)?;
        }
        if let Some(interval) = self.periodic_flush {
            logger.set_periodic_flush(interval)?;
        }
        Ok(logger)
    }
}
