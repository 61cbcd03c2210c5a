//! Logging macros that convert their arguments automatically.
//!
//! Each macro takes the logger, a template and any number of values that
//! convert into [`FormatArgument`](crate::format::FormatArgument), and
//! evaluates to the `Result` of the log call.
//!
//! # Examples
//!
//! ```
//! use flog::{info, warn, Logger};
//!
//! let logger = Logger::new("app");
//!
//! info!(logger, "Server started").unwrap();
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port).unwrap();
//!
//! let retries = 3u8;
//! warn!(logger, "Retry {0} of {1}, mask {2X}", retries, 5, 0xBEEFu32).unwrap();
//! ```

/// Build a `[FormatArgument; N]` from plain values.
///
/// ```
/// use flog::{args, format::render};
///
/// assert_eq!(render("{} {b}", &args![1.5, 5]).unwrap(), "1.5 101");
/// ```
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        [$($crate::format::FormatArgument::from($arg)),*]
    };
}

/// Log at an explicit level.
///
/// ```
/// # use flog::{Logger, LogLevel};
/// # let logger = Logger::new("app");
/// use flog::log;
/// log!(logger, LogLevel::Info, "Simple message").unwrap();
/// log!(logger, LogLevel::Error, "Error code: {}", 500).unwrap();
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $template:expr $(, $arg:expr)* $(,)?) => {
        $logger.log($level, $template, &$crate::args![$($arg),*])
    };
}

#[macro_export]
macro_rules! trace {
    ($logger:expr, $template:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $template $(, $arg)*)
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $template:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $template $(, $arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $template:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::LogLevel::Info, $template $(, $arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $template:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $template $(, $arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $template:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::LogLevel::Error, $template $(, $arg)*)
    };
}

/// Log a critical-level message.
///
/// ```
/// # use flog::Logger;
/// # let logger = Logger::new("app");
/// use flog::critical;
/// critical!(logger, "Unable to recover: {}", "disk full").unwrap();
/// ```
#[macro_export]
macro_rules! critical {
    ($logger:expr, $template:expr $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::LogLevel::Critical, $template $(, $arg)*)
    };
}
