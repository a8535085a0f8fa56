//! File sink

use crate::core::{sink::SinkCore, LoggerError, Result, Sink};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends rendered lines to a file through a buffered writer.
///
/// Buffered output is flushed on [`Sink::flush`] and on drop.
pub struct FileSink {
    core: SinkCore,
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileSink {
    /// Default write buffer size (64 KB)
    pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_buffer_size(path, Self::DEFAULT_BUFFER_SIZE)
    }

    /// Open `path` for appending, creating missing parent directories.
    pub fn with_buffer_size(path: impl Into<PathBuf>, buffer_size: usize) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "creating log directory",
                    parent.display().to_string(),
                    e,
                )
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LoggerError::io_operation("opening log file", path.display().to_string(), e)
            })?;

        Ok(Self {
            core: SinkCore::new(),
            path,
            writer: Mutex::new(Some(BufWriter::with_capacity(buffer_size, file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the file; later writes fail.
    pub fn close(&self) -> Result<()> {
        if let Some(mut writer) = self.writer.lock().take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Sink for FileSink {
    fn core(&self) -> &SinkCore {
        &self.core
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| LoggerError::sink_stopped(self.path.display().to_string()))?;
        writer.write_all(bytes)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Some(writer) = self.writer.lock().as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            eprintln!(
                "[LOGGER ERROR] Failed to flush '{}' on drop: {}",
                self.path.display(),
                e
            );
        }
    }
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Logger, Severity};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_file_sink_creates_parents() {
        let dir = tempdir().expect("Failed to create temp dir");
        let log_path = dir.path().join("nested").join("deeper").join("app.log");

        let sink = FileSink::new(&log_path).expect("Failed to create sink");
        assert_eq!(sink.path(), log_path.as_path());
        assert!(log_path.exists());
    }

    #[test]
    fn test_file_sink_write_through_logger() {
        let dir = tempdir().expect("Failed to create temp dir");
        let log_path = dir.path().join("app.log");

        let sink = Arc::new(FileSink::new(&log_path).expect("Failed to create sink"));
        let logger = Logger::builder("FILE")
            .level(Severity::Trace)
            .sink(sink.clone())
            .build();

        for i in 0..10 {
            logger.info(format!("Message {}", i));
        }
        logger.flush().expect("Failed to flush");

        let content = fs::read_to_string(&log_path).expect("Failed to read log file");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 10);
        assert!(lines[0].contains("[ INFO] FILE "));
        assert!(lines[9].ends_with("Message 9"));
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempdir().expect("Failed to create temp dir");
        let log_path = dir.path().join("append.log");

        {
            let sink = FileSink::new(&log_path).unwrap();
            sink.write(b"first\n").unwrap();
        }
        {
            let sink = FileSink::new(&log_path).unwrap();
            sink.write(b"second\n").unwrap();
        }

        let content = fs::read_to_string(&log_path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = tempdir().expect("Failed to create temp dir");
        let sink = FileSink::new(dir.path().join("closed.log")).unwrap();

        sink.close().unwrap();
        let err = sink.write(b"late\n").unwrap_err();
        assert!(matches!(err, LoggerError::SinkStopped(_)));
    }
}
