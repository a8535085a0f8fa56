//! Sink trait for log output destinations

use super::{
    entry::Snapshot,
    error::Result,
    formatter::Formatter,
    pool::LogBuffer,
    severity::{Severity, SeverityGate},
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Level gate and swappable formatter shared by every sink implementation.
#[derive(Debug)]
pub struct SinkCore {
    gate: SeverityGate,
    formatter: Mutex<Arc<Formatter>>,
}

impl SinkCore {
    /// Sink state at level `Trace` with the default formatter.
    pub fn new() -> Self {
        Self::with_formatter(Arc::new(Formatter::default()))
    }

    pub fn with_formatter(formatter: Arc<Formatter>) -> Self {
        Self {
            gate: SeverityGate::new(Severity::Trace),
            formatter: Mutex::new(formatter),
        }
    }

    pub fn gate(&self) -> &SeverityGate {
        &self.gate
    }

    pub fn formatter(&self) -> Arc<Formatter> {
        Arc::clone(&self.formatter.lock())
    }

    pub fn set_formatter(&self, formatter: Arc<Formatter>) {
        // The old formatter is released after the guard; in-flight renders
        // keep their own clone.
        let _previous = std::mem::replace(&mut *self.formatter.lock(), formatter);
    }
}

impl Default for SinkCore {
    fn default() -> Self {
        Self::new()
    }
}

/// A destination for rendered snapshots.
///
/// Implementors provide the destination capability (`write`/`flush`) and
/// expose their [`SinkCore`]; filtering and formatting come for free.
pub trait Sink: Send + Sync {
    fn core(&self) -> &SinkCore;

    /// Emit one rendered line.
    fn write(&self, bytes: &[u8]) -> Result<()>;

    /// Push any buffered output to the destination.
    fn flush(&self) -> Result<()>;

    fn name(&self) -> &str;

    /// Filter, render and write `snapshot`.
    fn log(&self, snapshot: &Snapshot) -> Result<()> {
        if !self.should_log(snapshot.severity()) {
            return Ok(());
        }
        let formatter = self.formatter();
        let mut line = LogBuffer::new();
        formatter.format(&mut line, snapshot);
        self.write(&line)
    }

    #[inline]
    fn should_log(&self, severity: Severity) -> bool {
        self.core().gate().should_log(severity)
    }

    fn level(&self) -> Severity {
        self.core().gate().level()
    }

    fn set_level(&self, level: Severity) {
        self.core().gate().set(level);
    }

    fn formatter(&self) -> Arc<Formatter> {
        self.core().formatter()
    }

    fn set_formatter(&self, formatter: Arc<Formatter>) {
        self.core().set_formatter(formatter);
    }
}

/// Identity comparison for shared sinks (data address only).
pub fn same_sink(a: &Arc<dyn Sink>, b: &Arc<dyn Sink>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
