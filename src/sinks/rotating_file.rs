//! Size-rotating file sink
//!
//! Records go to `<path>` until the next line would push the file past
//! `max_bytes`. The file is then closed and renamed to `<path>.<N>`, where N
//! grows with every rotation (the highest N is the newest backup), and a fresh
//! file is opened at `<path>`. Backups left by earlier runs are discovered at
//! open, so numbering continues instead of overwriting them.

use crate::core::error::{LoggerError, Result};
use crate::core::{LogRecord, Sink, TimestampFormat};
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const COMPRESSION_CHUNK: usize = 64 * 1024;

/// What the sink does with lines it cannot get into the log file: the file
/// cannot be reopened after a failed rotation, or a write or flush fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationFallback {
    /// Write the lines to stderr instead and report success
    #[default]
    Console,
    /// Return the error to the caller. Buffered lines stay queued for the
    /// next flush.
    Surface,
}

/// Rotating file sink
///
/// # Examples
///
/// ```no_run
/// use flog::sinks::{RotatingFileSink, RotationFallback};
///
/// let sink = RotatingFileSink::open("/var/log/app.log", 10 * 1024 * 1024)
///     .unwrap()
///     .with_max_backups(7)
///     .with_compression(true)
///     .with_fallback(RotationFallback::Surface);
/// ```
pub struct RotatingFileSink {
    path: PathBuf,
    max_bytes: u64,
    max_backups: Option<usize>,
    compress: bool,
    fallback: RotationFallback,
    timestamp_format: TimestampFormat,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    next_index: u64,
    /// Oldest first
    backups: Vec<PathBuf>,
    rotation_count: u64,
    /// Set while rotation keeps failing, so the failure is reported once
    rotation_failing: bool,
    /// Set while writes or flushes keep failing
    io_failing: bool,
    name: String,
}

impl RotatingFileSink {
    /// Open (or create) `path` for appending.
    ///
    /// # Errors
    ///
    /// Fails if `max_bytes` is zero, or the directory or file cannot be created.
    pub fn open<P: AsRef<Path>>(path: P, max_bytes: u64) -> Result<Self> {
        if max_bytes == 0 {
            return Err(LoggerError::config("RotatingFileSink", "max_bytes must be greater than 0"));
        }

        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "creating log directory",
                    format!("cannot create '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let (file, current_size) = Self::open_append(&path)?;
        let backups = Self::scan_backups(&path)?;
        let next_index = backups
            .last()
            .map(|(index, _)| index + 1)
            .unwrap_or(1);

        Ok(Self {
            name: format!("file:{}", path.display()),
            path,
            max_bytes,
            max_backups: None,
            compress: false,
            fallback: RotationFallback::default(),
            timestamp_format: TimestampFormat::default(),
            writer: Some(BufWriter::new(file)),
            current_size,
            next_index,
            backups: backups.into_iter().map(|(_, path)| path).collect(),
            rotation_count: 0,
            rotation_failing: false,
            io_failing: false,
        })
    }

    /// Keep at most `count` backups; older ones are deleted at the next rotation.
    #[must_use = "builder methods return a new value"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = Some(count);
        self
    }

    /// Gzip each backup to `<path>.<N>.gz`
    #[must_use = "builder methods return a new value"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_fallback(mut self, fallback: RotationFallback) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Bytes written to the current file, including buffered ones
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    /// Rotations performed by this sink since it was opened
    pub fn rotation_count(&self) -> u64 {
        self.rotation_count
    }

    /// Backup files known to this sink, oldest first
    pub fn backups(&self) -> &[PathBuf] {
        &self.backups
    }

    fn open_append(path: &Path) -> Result<(File, u64)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                LoggerError::io_operation("opening log file", path.display().to_string(), e)
            })?;
        let size = file
            .metadata()
            .map_err(|e| {
                LoggerError::io_operation("reading log file metadata", path.display().to_string(), e)
            })?
            .len();
        Ok((file, size))
    }

    /// Find `<name>.<N>` and `<name>.<N>.gz` next to `path`, sorted by N.
    fn scan_backups(path: &Path) -> Result<Vec<(u64, PathBuf)>> {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = format!("{}.", file_name);

        let entries = fs::read_dir(&dir).map_err(|e| {
            LoggerError::io_operation("scanning for backups", dir.display().to_string(), e)
        })?;

        let mut found = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(suffix) = name.strip_prefix(&prefix) else { continue };
            let digits = suffix.strip_suffix(".gz").unwrap_or(suffix);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if let Ok(index) = digits.parse::<u64>() {
                found.push((index, entry.path()));
            }
        }
        found.sort_by_key(|(index, _)| *index);
        Ok(found)
    }

    fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> Result<()> {
        let path_str = self.path.display().to_string();

        // On failure the writer stays in place with its buffer intact
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| LoggerError::rotation(&path_str, format!("flush before rotation: {}", e)))?;
        }
        self.writer = None;

        let backup = Self::with_suffix(&self.path, &format!(".{}", self.next_index));
        if let Err(e) = fs::rename(&self.path, &backup) {
            // Keep appending to the current file if it is still reachable
            self.reopen().ok();
            return Err(LoggerError::rotation(&path_str, format!("rename to backup: {}", e)));
        }
        self.next_index += 1;
        self.rotation_count += 1;

        let backup = if self.compress {
            match Self::compress(&backup) {
                Ok(gz) => gz,
                Err(e) => {
                    eprintln!("[FLOG WARN] Keeping uncompressed backup {}: {}", backup.display(), e);
                    backup
                }
            }
        } else {
            backup
        };
        self.backups.push(backup);
        self.enforce_retention();

        let (file, _) = Self::open_append(&self.path)
            .map_err(|e| LoggerError::rotation(&path_str, format!("open fresh file: {}", e)))?;
        self.writer = Some(BufWriter::new(file));
        self.current_size = 0;
        Ok(())
    }

    fn enforce_retention(&mut self) {
        let Some(max) = self.max_backups else { return };
        while self.backups.len() > max {
            let oldest = self.backups.remove(0);
            if let Err(e) = fs::remove_file(&oldest) {
                if e.kind() != io::ErrorKind::NotFound {
                    eprintln!("[FLOG WARN] Failed to remove old backup {}: {}", oldest.display(), e);
                }
            }
        }
    }

    /// Stream `path` into `<path>.gz`, removing the original only on success.
    fn compress(path: &Path) -> io::Result<PathBuf> {
        let gz_path = Self::with_suffix(path, ".gz");
        let tmp_path = Self::with_suffix(path, ".gz.tmp");

        let result = (|| {
            let mut reader = BufReader::with_capacity(COMPRESSION_CHUNK, File::open(path)?);
            let output = BufWriter::with_capacity(COMPRESSION_CHUNK, File::create(&tmp_path)?);
            let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());
            let mut buffer = vec![0u8; COMPRESSION_CHUNK];
            loop {
                let read = reader.read(&mut buffer)?;
                if read == 0 {
                    break;
                }
                encoder.write_all(&buffer[..read])?;
            }
            encoder.finish()?.flush()?;
            fs::rename(&tmp_path, &gz_path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        if let Err(e) = fs::remove_file(path) {
            eprintln!(
                "[FLOG WARN] Compressed {} but could not remove the original: {}",
                path.display(),
                e
            );
        }
        Ok(gz_path)
    }

    fn reopen(&mut self) -> Result<()> {
        let (file, size) = Self::open_append(&self.path)?;
        self.writer = Some(BufWriter::new(file));
        self.current_size = size;
        Ok(())
    }

    fn report_failure(&mut self, error: &LoggerError) {
        if !self.rotation_failing {
            self.rotation_failing = true;
            eprintln!("[FLOG WARN] {}; further rotation failures are suppressed until one succeeds", error);
        }
    }

    /// Handle a failed write or flush of the current file.
    ///
    /// With [`RotationFallback::Console`] everything still buffered, then
    /// `line`, goes to stderr and the size counter is resynced with the file.
    fn recover_io(&mut self, operation: &str, source: io::Error, line: Option<&str>) -> Result<()> {
        let error = LoggerError::io_operation(operation, self.path.display().to_string(), source);
        if !self.io_failing {
            self.io_failing = true;
            eprintln!(
                "[FLOG WARN] {}; writing to stderr until the file accepts data again",
                error
            );
        }

        if self.fallback == RotationFallback::Surface {
            return Err(error);
        }

        let mut stderr = io::stderr().lock();
        if let Some(writer) = self.writer.take() {
            let (file, buffered) = writer.into_parts();
            if let Ok(bytes) = buffered {
                let _ = stderr.write_all(&bytes);
            }
            self.current_size = file.metadata().map(|m| m.len()).unwrap_or(self.current_size);
            self.writer = Some(BufWriter::new(file));
        }
        if let Some(line) = line {
            let _ = stderr.write_all(line.as_bytes());
        }
        let _ = stderr.flush();
        Ok(())
    }
}

impl Sink for RotatingFileSink {
    fn write(&mut self, record: &LogRecord) -> Result<()> {
        let mut line = record.to_line(&self.timestamp_format);
        line.push('\n');
        let len = line.len() as u64;

        // An empty file takes any record, even one larger than max_bytes
        if self.writer.is_some() && self.current_size > 0 && self.current_size + len > self.max_bytes {
            match self.rotate() {
                Ok(()) => self.rotation_failing = false,
                Err(e) => self.report_failure(&e),
            }
        }

        if self.writer.is_none() {
            if let Err(e) = self.reopen() {
                let error = LoggerError::rotation(self.path.display().to_string(), e.to_string());
                self.report_failure(&error);
                return match self.fallback {
                    RotationFallback::Console => {
                        eprint!("{}", line);
                        Ok(())
                    }
                    RotationFallback::Surface => Err(error),
                };
            }
        }

        let written = match self.writer.as_mut() {
            Some(writer) => writer.write_all(line.as_bytes()),
            None => return Ok(()),
        };
        match written {
            Ok(()) => {
                self.current_size += len;
                Ok(())
            }
            Err(e) => self.recover_io("writing log file", e, Some(&line)),
        }
    }

    fn flush(&mut self) -> Result<()> {
        let flushed = match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => return Ok(()),
        };
        match flushed {
            Ok(()) => {
                self.io_failing = false;
                Ok(())
            }
            Err(e) => self.recover_io("flushing log file", e, None),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        if let Err(e) = Sink::flush(self) {
            eprintln!("[FLOG ERROR] Failed to flush {} on close: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use flate2::read::GzDecoder;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(LogLevel::Info, Arc::from("rot"), message.to_string())
    }

    fn line_len(message: &str) -> u64 {
        record(message).to_line(&TimestampFormat::default()).len() as u64 + 1
    }

    #[test]
    fn test_rejects_zero_max_bytes() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            RotatingFileSink::open(dir.path().join("a.log"), 0),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("app.log");
        let sink = RotatingFileSink::open(&path, 1024).unwrap();
        assert!(path.exists());
        assert_eq!(sink.current_size(), 0);
    }

    #[test]
    fn test_rotates_before_exceeding_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let len = line_len("message-00");
        let mut sink = RotatingFileSink::open(&path, 3 * len).unwrap();

        for i in 0..10 {
            sink.write(&record(&format!("message-{:02}", i))).unwrap();
        }
        sink.flush().unwrap();

        // Records 4, 7 and 10 each cross the threshold once
        assert_eq!(sink.rotation_count(), 3);
        assert_eq!(sink.backups().len(), 3);
        for index in 1..=3 {
            let backup = dir.path().join(format!("app.log.{}", index));
            let size = fs::metadata(&backup).unwrap().len();
            assert_eq!(size, 3 * len);
        }
        assert_eq!(fs::metadata(&path).unwrap().len(), len);
        assert_eq!(sink.current_size(), len);

        let first = fs::read_to_string(dir.path().join("app.log.1")).unwrap();
        assert!(first.contains("message-00"));
        let newest = fs::read_to_string(dir.path().join("app.log.3")).unwrap();
        assert!(newest.contains("message-08"));
        assert!(fs::read_to_string(&path).unwrap().contains("message-09"));
    }

    #[test]
    fn test_oversized_record_goes_to_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.log");
        let mut sink = RotatingFileSink::open(&path, 16).unwrap();

        sink.write(&record("far too long for sixteen bytes")).unwrap();
        assert_eq!(sink.rotation_count(), 0);

        sink.write(&record("second")).unwrap();
        assert_eq!(sink.rotation_count(), 1);
        sink.flush().unwrap();
        assert!(fs::read_to_string(dir.path().join("big.log.1"))
            .unwrap()
            .contains("far too long"));
    }

    #[test]
    fn test_size_starts_from_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("existing.log");
        fs::write(&path, "x".repeat(100)).unwrap();

        let sink = RotatingFileSink::open(&path, 1024).unwrap();
        assert_eq!(sink.current_size(), 100);
    }

    #[test]
    fn test_continues_existing_backup_numbering() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(dir.path().join("app.log.1"), "old").unwrap();
        fs::write(dir.path().join("app.log.2.gz"), "older").unwrap();
        fs::write(dir.path().join("app.log.notes"), "ignored").unwrap();
        fs::write(&path, "y".repeat(50)).unwrap();

        let mut sink = RotatingFileSink::open(&path, 60).unwrap();
        assert_eq!(sink.backups().len(), 2);

        sink.write(&record("triggers rotation")).unwrap();
        assert_eq!(sink.rotation_count(), 1);
        assert_eq!(fs::read_to_string(dir.path().join("app.log.3")).unwrap(), "y".repeat(50));
        assert_eq!(fs::read_to_string(dir.path().join("app.log.1")).unwrap(), "old");
    }

    #[test]
    fn test_retention_keeps_newest_backups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let len = line_len("entry");
        let mut sink = RotatingFileSink::open(&path, len).unwrap().with_max_backups(2);

        for _ in 0..6 {
            sink.write(&record("entry")).unwrap();
        }

        assert_eq!(sink.rotation_count(), 5);
        assert_eq!(sink.backups().len(), 2);
        assert!(!dir.path().join("app.log.3").exists());
        assert!(dir.path().join("app.log.4").exists());
        assert!(dir.path().join("app.log.5").exists());
    }

    #[test]
    fn test_compressed_backups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let len = line_len("compress me");
        let mut sink = RotatingFileSink::open(&path, len).unwrap().with_compression(true);

        sink.write(&record("compress me")).unwrap();
        sink.write(&record("compress me")).unwrap();

        let gz = dir.path().join("app.log.1.gz");
        assert!(gz.exists());
        assert!(!dir.path().join("app.log.1").exists());
        assert_eq!(sink.backups(), &[gz.clone()]);

        let mut decoded = String::new();
        GzDecoder::new(File::open(&gz).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert!(decoded.ends_with("compress me\n"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_write_failure_falls_back_to_console() {
        let mut sink = RotatingFileSink::open("/dev/full", 1024 * 1024).unwrap();
        let big = "z".repeat(20 * 1024);

        // Larger than the write buffer, so it hits the device immediately
        sink.write(&record(&big)).unwrap();
        assert_eq!(sink.current_size(), 0);

        // Buffered first, then rerouted when the flush fails
        sink.write(&record("small")).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.current_size(), 0);
        sink.flush().unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_surface_fallback_returns_write_failure() {
        let mut sink = RotatingFileSink::open("/dev/full", 1024 * 1024)
            .unwrap()
            .with_fallback(RotationFallback::Surface);

        let err = sink.write(&record(&"z".repeat(20 * 1024))).unwrap_err();
        assert!(matches!(err, LoggerError::IoOperation { .. }));

        sink.write(&record("small")).unwrap();
        assert!(matches!(sink.flush(), Err(LoggerError::IoOperation { .. })));
        // The line is still buffered and the failure still surfaced
        assert!(sink.flush().is_err());
    }

    #[test]
    fn test_surface_fallback_reports_rotation_failure() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("vanishing");
        let path = log_dir.join("app.log");
        let len = line_len("entry");
        let mut sink = RotatingFileSink::open(&path, len)
            .unwrap()
            .with_fallback(RotationFallback::Surface);

        sink.write(&record("entry")).unwrap();
        fs::remove_dir_all(&log_dir).unwrap();

        let err = sink.write(&record("entry")).unwrap_err();
        assert!(matches!(err, LoggerError::RotationFailed { .. }));
        // Still failing, still surfaced
        assert!(sink.write(&record("entry")).is_err());
    }

    #[test]
    fn test_console_fallback_keeps_logging() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("vanishing");
        let path = log_dir.join("app.log");
        let len = line_len("entry");
        let mut sink = RotatingFileSink::open(&path, len).unwrap();

        sink.write(&record("entry")).unwrap();
        fs::remove_dir_all(&log_dir).unwrap();
        assert!(sink.write(&record("entry")).is_ok());

        // Recovers once the directory is back
        fs::create_dir_all(&log_dir).unwrap();
        sink.write(&record("entry")).unwrap();
        sink.flush().unwrap();
        assert!(path.exists());
    }
}
