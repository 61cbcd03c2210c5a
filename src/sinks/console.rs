//! Console sink implementation

use crate::core::{LogRecord, Result, Sink, TimestampFormat};
use colored::Colorize;
use serde::Deserialize;
use std::io::{self, Write};

/// Which standard stream a [`ConsoleSink`] writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    Stderr,
}

pub struct ConsoleSink {
    target: ConsoleTarget,
    use_colors: bool,
    timestamp_format: TimestampFormat,
}

impl ConsoleSink {
    /// Plain lines on stdout
    pub fn new() -> Self {
        Self::with_target(ConsoleTarget::Stdout)
    }

    pub fn stderr() -> Self {
        Self::with_target(ConsoleTarget::Stderr)
    }

    pub fn with_target(target: ConsoleTarget) -> Self {
        Self {
            target,
            use_colors: false,
            timestamp_format: TimestampFormat::default(),
        }
    }

    /// Color the level tag with ANSI escapes
    ///
    /// ```
    /// use flog::sinks::ConsoleSink;
    ///
    /// let sink = ConsoleSink::stderr().with_colors(true);
    /// assert!(sink.uses_colors());
    /// ```
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }

    pub fn uses_colors(&self) -> bool {
        self.use_colors
    }

    fn render(&self, record: &LogRecord) -> String {
        if !self.use_colors {
            return record.to_line(&self.timestamp_format);
        }

        let level = format!("{:5}", record.level().to_str()).color(record.level().color_code());
        format!(
            "[{}] [{}] [{}] {}",
            self.timestamp_format.format(record.timestamp()),
            level,
            record.logger(),
            record.message()
        )
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn write(&mut self, record: &LogRecord) -> Result<()> {
        let line = self.render(record);
        match self.target {
            ConsoleTarget::Stdout => writeln!(io::stdout().lock(), "{}", line)?,
            ConsoleTarget::Stderr => writeln!(io::stderr().lock(), "{}", line)?,
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match self.target {
            ConsoleTarget::Stdout => io::stdout().flush()?,
            ConsoleTarget::Stderr => io::stderr().flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        match self.target {
            ConsoleTarget::Stdout => "console:stdout",
            ConsoleTarget::Stderr => "console:stderr",
        }
    }
}
