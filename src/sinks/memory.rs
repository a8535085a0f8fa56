//! In-memory sink, mainly for tests and embedding

use crate::core::{sink::SinkCore, Result, Sink};
use parking_lot::Mutex;

/// Collects rendered lines in a byte buffer.
///
/// # Example
///
/// ```
/// use ldgr::prelude::*;
/// use std::sync::Arc;
///
/// let sink = Arc::new(MemorySink::new());
/// let logger = Logger::builder("MEM").sink(sink.clone()).build();
///
/// logger.warn("disk almost full");
/// assert!(sink.contents().ends_with("disk almost full\n"));
/// ```
#[derive(Debug)]
pub struct MemorySink {
    core: SinkCore,
    name: String,
    buffer: Mutex<Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_name("memory")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            core: SinkCore::new(),
            name: name.into(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Raw bytes written so far
    pub fn bytes(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }

    /// Everything written so far, lossily decoded as UTF-8
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    /// Written lines without their terminators
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MemorySink {
    fn core(&self) -> &SinkCore {
        &self.core
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        self.buffer.lock().extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
