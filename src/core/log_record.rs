//! Log record structure

use super::log_level::LogLevel;
use super::timestamp::TimestampFormat;
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::sync::Arc;

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<Arc<str>>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<Arc<str>>>> = const { RefCell::new(None) };
}

fn current_thread_id() -> Arc<str> {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| Arc::from(format!("{:?}", std::thread::current().id())))
            .clone()
    })
}

fn current_thread_name() -> Option<Arc<str>> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(Arc::from))
            .clone()
    })
}

/// One rendered log call. Immutable once built; moved to whichever thread
/// delivers it to the sinks.
#[derive(Debug, Clone)]
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    level: LogLevel,
    logger: Arc<str>,
    message: String,
    thread_id: Arc<str>,
    thread_name: Option<Arc<str>>,
}

impl LogRecord {
    /// Escape line breaks and tabs so one record always occupies one line.
    fn sanitize_message(message: String) -> String {
        if !message.contains(&['\n', '\r', '\t'][..]) {
            return message;
        }
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(level: LogLevel, logger: Arc<str>, message: String) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            logger,
            message: Self::sanitize_message(message),
            thread_id: current_thread_id(),
            thread_name: current_thread_name(),
        }
    }

    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn logger(&self) -> &str {
        &self.logger
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    /// Canonical single-line layout, without the trailing newline:
    /// `[timestamp] [LEVEL] [logger] message`
    pub fn to_line(&self, timestamp_format: &TimestampFormat) -> String {
        format!(
            "[{}] [{:5}] [{}] {}",
            timestamp_format.format(&self.timestamp),
            self.level,
            self.logger,
            self.message
        )
    }
}
