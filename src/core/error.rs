//! Error types for the logging engine

use crate::format::FormatError;

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Bad template or argument mismatch, surfaced to the caller of the log call
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A sink failed to write or flush
    #[error("Sink '{sink}' failed: {message}")]
    SinkWrite { sink: String, message: String },

    /// File rotation could not complete
    #[error("File rotation failed for '{path}': {message}")]
    RotationFailed { path: String, message: String },

    /// Task submitted to a pool that has been shut down
    #[error("Thread pool is closed")]
    PoolClosed,

    /// A logger with this name is already registered
    #[error("Logger '{name}' is already registered")]
    DuplicateName { name: String },

    /// Shutdown finished but some loggers could not drain in time
    #[error("Shutdown timed out: {loggers} logger(s) did not drain, {dropped} record(s) dropped")]
    ShutdownTimeout { loggers: usize, dropped: u64 },

    /// The logger manager has been shut down
    #[error("Logger manager already shut down")]
    ManagerClosed,

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a sink failure error
    pub fn sink_write(sink: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::SinkWrite {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create a rotation failure error
    pub fn rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::RotationFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// Whether this error came from template rendering
    pub fn is_format(&self) -> bool {
        matches!(self, LoggerError::Format(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LoggerError::config("RotatingFileSink", "max_bytes must be positive");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));

        let err = LoggerError::rotation("/var/log/app.log", "Permission denied");
        assert!(matches!(err, LoggerError::RotationFailed { .. }));

        let err: LoggerError = FormatError::UnmatchedOpen { position: 3 }.into();
        assert!(err.is_format());
    }

    #[test]
    fn test_error_display() {
        let err = LoggerError::DuplicateName {
            name: "net".to_string(),
        };
        assert_eq!(err.to_string(), "Logger 'net' is already registered");

        let err = LoggerError::rotation("/var/log/app.log", "Disk full");
        assert_eq!(
            err.to_string(),
            "File rotation failed for '/var/log/app.log': Disk full"
        );

        let err = LoggerError::ShutdownTimeout {
            loggers: 1,
            dropped: 12,
        };
        assert_eq!(
            err.to_string(),
            "Shutdown timed out: 1 logger(s) did not drain, 12 record(s) dropped"
        );
    }

    #[test]
    fn test_io_operation_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = LoggerError::io_operation("spawning worker", "cannot start thread", io_err);

        assert!(matches!(err, LoggerError::IoOperation { .. }));
        assert!(err.to_string().contains("spawning worker"));
        assert!(err.to_string().contains("cannot start thread"));
    }
}
