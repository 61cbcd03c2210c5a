//! Sink trait for log output destinations

use super::{error::Result, log_record::LogRecord};

/// A destination for rendered records.
///
/// A sink belongs to exactly one logger, which serializes every call to it,
/// so implementations need no internal locking.
pub trait Sink: Send {
    fn write(&mut self, record: &LogRecord) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;
}
