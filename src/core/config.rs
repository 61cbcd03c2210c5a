//! Declarative logger and manager configuration
//!
//! [`LoggerConfig`] deserializes from any serde format and converts into a
//! [`LoggerBuilder`](super::LoggerBuilder).
//!
//! ```
//! use flog::LoggerConfig;
//!
//! let config: LoggerConfig = serde_json::from_str(r#"{
//!     "name": "http",
//!     "level": "warning",
//!     "console": { "target": "stderr", "colors": false },
//!     "backtrace_threshold": 50
//! }"#).unwrap();
//!
//! let logger = config.into_builder().build().unwrap();
//! assert_eq!(logger.name(), "http");
//! ```

use super::error::Result;
use super::log_level::LogLevel;
use super::logger::LoggerBuilder;
use super::timestamp::TimestampFormat;
use crate::format::DEFAULT_TEMPLATE_CACHE_CAPACITY;
use crate::sinks::{ConsoleTarget, RotatingFileSink, RotationFallback};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default `max_bytes` for file sinks (10 MB)
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Default drain deadline for [`LoggerManager::shutdown`](crate::LoggerManager::shutdown)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub target: ConsoleTarget,
    pub colors: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileSinkConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    /// Unlimited when absent
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub compress: bool,
    #[serde(default)]
    pub fallback: RotationFallback,
}

impl FileSinkConfig {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            path: path.into(),
            max_bytes,
            max_backups: None,
            compress: false,
            fallback: RotationFallback::default(),
        }
    }

    pub fn open(&self, timestamp_format: TimestampFormat) -> Result<RotatingFileSink> {
        let mut sink = RotatingFileSink::open(&self.path, self.max_bytes)?
            .with_compression(self.compress)
            .with_fallback(self.fallback)
            .with_timestamp_format(timestamp_format);
        if let Some(max) = self.max_backups {
            sink = sink.with_max_backups(max);
        }
        Ok(sink)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggerConfig {
    pub name: String,
    #[serde(default)]
    pub level: LogLevel,
    /// No console output when absent
    #[serde(default)]
    pub console: Option<ConsoleConfig>,
    #[serde(default)]
    pub file: Option<FileSinkConfig>,
    /// Periodic flush interval; zero or absent disables the timer
    #[serde(default)]
    pub periodic_flush_ms: Option<u64>,
    /// Zero disables threshold flushing
    #[serde(default)]
    pub backtrace_threshold: u32,
    #[serde(default)]
    pub timestamp_format: TimestampFormat,
}

impl LoggerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: LogLevel::default(),
            console: None,
            file: None,
            periodic_flush_ms: None,
            backtrace_threshold: 0,
            timestamp_format: TimestampFormat::default(),
        }
    }

    pub fn into_builder(self) -> LoggerBuilder {
        let mut builder = LoggerBuilder::new(self.name)
            .min_level(self.level)
            .timestamp_format(self.timestamp_format)
            .backtrace_threshold(self.backtrace_threshold);

        if let Some(console) = self.console {
            builder = builder.console_with_colors(console.target, console.colors);
        }
        if let Some(file) = self.file {
            builder = builder.file_config(file);
        }
        if let Some(ms) = self.periodic_flush_ms.filter(|ms| *ms > 0) {
            builder = builder.periodic_flush(Duration::from_millis(ms));
        }
        builder
    }
}

/// Settings for a [`LoggerManager`](crate::LoggerManager)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Single deadline shared by every logger draining at shutdown
    pub shutdown_timeout: Duration,
    /// Minimum level of loggers created by the manager
    pub default_level: LogLevel,
    pub template_cache_capacity: usize,
}

impl ManagerConfig {
    #[must_use = "builder methods return a new value"]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_default_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_template_cache_capacity(mut self, capacity: usize) -> Self {
        self.template_cache_capacity = capacity;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            default_level: LogLevel::default(),
            template_cache_capacity: DEFAULT_TEMPLATE_CACHE_CAPACITY,
        }
    }
}
