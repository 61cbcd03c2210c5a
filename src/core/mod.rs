//! Core logger types and traits

pub(crate) mod dispatch;
pub(crate) mod flush;

pub mod config;
pub mod error;
pub mod log_level;
pub mod log_record;
pub mod logger;
pub mod manager;
pub mod metrics;
pub mod sink;
pub mod thread_pool;
pub mod timestamp;

pub use config::{
    ConsoleConfig, FileSinkConfig, LoggerConfig, ManagerConfig, DEFAULT_MAX_FILE_BYTES,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use error::{LoggerError, Result};
pub use log_level::LogLevel;
pub use log_record::LogRecord;
pub use logger::{Logger, LoggerBuilder, LoggerState};
pub use manager::{LoggerManager, DEFAULT_LOGGER_NAME};
pub use metrics::LoggerMetrics;
pub use sink::Sink;
pub use thread_pool::{Lane, ThreadPool, ThreadPoolBuilder, DEFAULT_POOL_SIZE};
pub use timestamp::TimestampFormat;
