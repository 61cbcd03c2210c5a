//! # flog
//!
//! An embeddable, leveled logging engine with indexed template formatting,
//! synchronous or pooled asynchronous delivery, size-rotating file output and
//! coordinated shutdown.
//!
//! ## Features
//!
//! - **Template formatting**: `{}`, `{N}`, `{.N}`, `{b}`, `{x}`/`{X}`, `{e}`, `{g}`
//!   with parsed templates cached per call site
//! - **Async delivery**: loggers share a [`ThreadPool`] while keeping their own
//!   records in order
//! - **Sinks**: console and size-rotating files, or any [`Sink`] implementation
//! - **Flush policies**: periodic timer and every-N-records threshold
//! - **Registry**: named loggers plus a default one, shut down together
//!
//! ```
//! use flog::{LogLevel, Logger, ThreadPool};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let pool = Arc::new(ThreadPool::new(2).unwrap());
//! let logger = Logger::new("main");
//! logger.enable_async(&pool).unwrap();
//! logger.set_min_level(LogLevel::Debug);
//!
//! logger.info("{0} is {1}", &[13.into(), 10.into()]).unwrap();
//! logger.debug("mask {X}", &[255.into()]).unwrap();
//!
//! logger.shutdown(Duration::from_secs(1)).unwrap();
//! ```

pub mod core;
pub mod format;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        LogLevel, LogRecord, Logger, LoggerBuilder, LoggerError, LoggerManager, LoggerState,
        Result, Sink, ThreadPool,
    };
    pub use crate::format::FormatArgument;
    pub use crate::sinks::{ConsoleSink, ConsoleTarget, RotatingFileSink, RotationFallback};
}

pub use crate::core::{
    ConsoleConfig, FileSinkConfig, Lane, LogLevel, LogRecord, Logger, LoggerBuilder, LoggerConfig,
    LoggerError, LoggerManager, LoggerMetrics, LoggerState, ManagerConfig, Result, Sink, ThreadPool,
    ThreadPoolBuilder, TimestampFormat, DEFAULT_LOGGER_NAME, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::format::{FormatArgument, FormatError};

/// Log through the global manager's default logger.
pub fn log(level: LogLevel, template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
    LoggerManager::global().default_logger().log(level, template, args)
}

pub fn trace(template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
    log(LogLevel::Trace, template, args)
}

pub fn debug(template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
    log(LogLevel::Debug, template, args)
}

pub fn info(template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
    log(LogLevel::Info, template, args)
}

pub fn warn(template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
    log(LogLevel::Warn, template, args)
}

pub fn error(template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
    log(LogLevel::Error, template, args)
}

pub fn critical(template: &str, args: &[FormatArgument<'_>]) -> Result<()> {
    log(LogLevel::Critical, template, args)
}

/// Shut down the global manager. After this every module-level call is a no-op.
pub fn shutdown() -> Result<()> {
    LoggerManager::global().shutdown()
}
