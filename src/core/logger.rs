//! Named logger: severity gate plus an ordered set of sinks

use super::{
    entry::{LogEntry, Snapshot},
    error::{LoggerError, Result},
    fmtutil,
    metrics::LoggerMetrics,
    pool::{BufferFactory, BufferPool},
    severity::{Severity, SeverityGate},
    sink::{same_sink, Sink},
};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::Arc;

/// Default level for newly built loggers
pub const DEFAULT_LOGGER_LEVEL: Severity = Severity::Info;

pub struct Logger {
    name: String,
    gate: SeverityGate,
    sinks: Mutex<Vec<Arc<dyn Sink>>>,
    factory: Arc<dyn BufferFactory>,
    local_time: bool,
    count_filtered: bool,
    /// Metrics for observability (delivered, filtered, sink failures)
    metrics: LoggerMetrics,
}

impl Logger {
    /// Create a logger at [`DEFAULT_LOGGER_LEVEL`] with one sink.
    pub fn new(
        name: impl Into<String>,
        sink: Arc<dyn Sink>,
        factory: Arc<dyn BufferFactory>,
    ) -> Self {
        Self::builder(name).sink(sink).buffer_factory(factory).build()
    }

    #[must_use]
    pub fn builder(name: impl Into<String>) -> LoggerBuilder {
        LoggerBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn level(&self) -> Severity {
        self.gate.level()
    }

    #[inline]
    pub fn set_level(&self, level: Severity) {
        self.gate.set(level);
    }

    /// Lock-free fast reject for the hot path.
    #[inline]
    pub fn should_log(&self, severity: Severity) -> bool {
        self.gate.should_log(severity)
    }

    /// Whether snapshots are stamped in local time rather than UTC
    pub fn uses_local_time(&self) -> bool {
        self.local_time
    }

    pub fn buffer_factory(&self) -> &Arc<dyn BufferFactory> {
        &self.factory
    }

    /// Attach `sink`; a no-op if it is already attached.
    pub fn add_sink(&self, sink: Arc<dyn Sink>) {
        let mut sinks = self.sinks.lock();
        if !sinks.iter().any(|s| same_sink(s, &sink)) {
            sinks.push(sink);
        }
    }

    /// Detach `sink`; a no-op if it is not attached.
    pub fn remove_sink(&self, sink: &Arc<dyn Sink>) {
        self.sinks.lock().retain(|s| !same_sink(s, sink));
    }

    /// Attached sinks in attachment order.
    pub fn sinks(&self) -> Vec<Arc<dyn Sink>> {
        self.sinks.lock().clone()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// Count an entry rejected by [`should_log`](Self::should_log), unless
    /// the logger was built with `count_filtered(false)`.
    #[inline]
    pub fn record_filtered(&self) {
        if self.count_filtered {
            self.metrics.record_filtered();
        }
    }

    /// Snapshot `entry` and fan it out to every sink.
    ///
    /// Entries below the logger's level are dropped before any buffer is
    /// acquired or lock taken. Their only trace is a relaxed increment of the
    /// `filtered` counter, which `LoggerBuilder::count_filtered(false)` turns
    /// off.
    pub fn log(&self, entry: &LogEntry<'_>) {
        if !self.should_log(entry.severity) {
            self.record_filtered();
            return;
        }
        let snapshot = Snapshot::capture(entry, self.local_time, self.factory.as_ref());
        self.dispatch(&snapshot);
    }

    /// Fan an already captured snapshot out to every sink.
    ///
    /// The sink list stays locked for the whole fan-out, so sinks attached or
    /// removed meanwhile take effect on the next call. A sink must not log
    /// back into the same logger.
    pub fn dispatch(&self, snapshot: &Snapshot) {
        let sinks = self.sinks.lock();

        // Per-sink panic isolation: one failing destination must not
        // starve the ones after it.
        for sink in sinks.iter() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| sink.log(snapshot)));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!(
                        "[LOGGER ERROR] Sink '{}' on logger '{}' failed: {}",
                        sink.name(),
                        self.name,
                        e
                    );
                    self.metrics.record_sink_failure();
                }
                Err(panic_info) => {
                    eprintln!(
                        "[LOGGER CRITICAL] Sink '{}' on logger '{}' panicked: {}. \
                         Other sinks continue to function.",
                        sink.name(),
                        self.name,
                        panic_message(&*panic_info)
                    );
                    self.metrics.record_sink_failure();
                }
            }
        }

        self.metrics.record_logged();
    }

    /// Log `message` with the caller's file and line.
    #[track_caller]
    pub fn log_message(&self, severity: Severity, message: impl AsRef<[u8]>) {
        if !self.should_log(severity) {
            self.record_filtered();
            return;
        }
        let location = Location::caller();
        let mut digits = [0u8; 10];
        let line = fmtutil::u32_digits(location.line(), &mut digits);
        let entry = LogEntry::new(severity, self.name.as_str(), message.as_ref())
            .with_location(location.file(), line);
        self.log(&entry);
    }

    #[inline]
    #[track_caller]
    pub fn trace(&self, message: impl AsRef<[u8]>) {
        self.log_message(Severity::Trace, message);
    }

    #[inline]
    #[track_caller]
    pub fn debug(&self, message: impl AsRef<[u8]>) {
        self.log_message(Severity::Debug, message);
    }

    #[inline]
    #[track_caller]
    pub fn info(&self, message: impl AsRef<[u8]>) {
        self.log_message(Severity::Info, message);
    }

    #[inline]
    #[track_caller]
    pub fn warn(&self, message: impl AsRef<[u8]>) {
        self.log_message(Severity::Warn, message);
    }

    #[inline]
    #[track_caller]
    pub fn error(&self, message: impl AsRef<[u8]>) {
        self.log_message(Severity::Error, message);
    }

    #[inline]
    #[track_caller]
    pub fn fatal(&self, message: impl AsRef<[u8]>) {
        self.log_message(Severity::Fatal, message);
    }

    /// Flush every sink, continuing past failures; returns the first error.
    pub fn flush(&self) -> Result<()> {
        let sinks = self.sinks();
        let mut first_error: Option<LoggerError> = None;
        for sink in &sinks {
            if let Err(e) = sink.flush() {
                eprintln!("[LOGGER ERROR] Sink '{}' flush failed: {}", sink.name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("sinks", &self.sink_count())
            .field("local_time", &self.local_time)
            .field("count_filtered", &self.count_filtered)
            .finish()
    }
}

/// Builder for constructing a [`Logger`] with a fluent API
///
/// # Example
/// ```
/// use ldgr::prelude::*;
/// use std::sync::Arc;
///
/// let sink = Arc::new(MemorySink::new());
/// let logger = Logger::builder("APP.NET")
///     .level(Severity::Debug)
///     .sink(sink.clone())
///     .buffer_factory(Arc::new(BufferPool::new()))
///     .build();
///
/// logger.debug("connected");
/// assert_eq!(sink.lines().len(), 1);
/// ```
pub struct LoggerBuilder {
    name: String,
    level: Severity,
    sinks: Vec<Arc<dyn Sink>>,
    factory: Option<Arc<dyn BufferFactory>>,
    local_time: bool,
    count_filtered: bool,
}

impl LoggerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: DEFAULT_LOGGER_LEVEL,
            sinks: Vec::new(),
            factory: None,
            local_time: false,
            count_filtered: true,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn level(mut self, level: Severity) -> Self {
        self.level = level;
        self
    }

    /// Add a sink; duplicates are ignored.
    #[must_use = "builder methods return a new value"]
    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        if !self.sinks.iter().any(|s| same_sink(s, &sink)) {
            self.sinks.push(sink);
        }
        self
    }

    /// Share a buffer factory; defaults to a private [`BufferPool`].
    #[must_use = "builder methods return a new value"]
    pub fn buffer_factory(mut self, factory: Arc<dyn BufferFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Stamp snapshots in local time instead of UTC
    #[must_use = "builder methods return a new value"]
    pub fn local_time(mut self, local_time: bool) -> Self {
        self.local_time = local_time;
        self
    }

    /// Whether entries rejected by the level gate bump the `filtered`
    /// counter. On by default; off makes a rejected call free of writes.
    #[must_use = "builder methods return a new value"]
    pub fn count_filtered(mut self, count: bool) -> Self {
        self.count_filtered = count;
        self
    }

    pub fn build(self) -> Logger {
        Logger {
            name: self.name,
            gate: SeverityGate::new(self.level),
            sinks: Mutex::new(self.sinks),
            factory: self
                .factory
                .unwrap_or_else(|| Arc::new(BufferPool::new()) as Arc<dyn BufferFactory>),
            local_time: self.local_time,
            count_filtered: self.count_filtered,
            metrics: LoggerMetrics::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sink::SinkCore;
    use crate::sinks::MemorySink;
    use chrono::DateTime;
    use std::thread;

    struct FailingSink {
        core: SinkCore,
        panic: bool,
    }

    impl Sink for FailingSink {
        fn core(&self) -> &SinkCore {
            &self.core
        }

        fn write(&self, _bytes: &[u8]) -> Result<()> {
            if self.panic {
                panic!("destination exploded");
            }
            Err(LoggerError::writer("destination unavailable"))
        }

        fn flush(&self) -> Result<()> {
            Err(LoggerError::writer("flush unavailable"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn entry(severity: Severity) -> LogEntry<'static> {
        LogEntry::new(severity, "TEST", "payload")
            .with_location("src/core/logger.rs", "1")
            .with_timestamp(DateTime::from_timestamp_micros(1_598_153_679_123_456).unwrap())
    }

    #[test]
    fn test_should_log_monotonic() {
        let logger = Logger::builder("GATE").build();
        for (i, &low) in Severity::ALL.iter().enumerate() {
            for &high in &Severity::ALL[i + 1..] {
                logger.set_level(high);
                assert!(!logger.should_log(low), "{} passed a {} gate", low, high);
                logger.set_level(low);
                assert!(logger.should_log(low));
                assert!(logger.should_log(high));
            }
        }
    }

    #[test]
    fn test_filtered_entry_acquires_nothing() {
        let pool = BufferPool::new();
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::builder("QUIET")
            .level(Severity::Error)
            .sink(sink.clone())
            .buffer_factory(Arc::new(pool.clone()))
            .build();

        logger.log(&entry(Severity::Info));

        assert_eq!(pool.stats().nodes_allocated(), 0);
        assert_eq!(logger.metrics().filtered_count(), 1);
        assert!(sink.contents().is_empty());
    }

    #[test]
    fn test_filtered_entry_without_counting_leaves_no_trace() {
        let pool = BufferPool::new();
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::builder("SILENT")
            .level(Severity::Error)
            .count_filtered(false)
            .sink(sink.clone())
            .buffer_factory(Arc::new(pool.clone()))
            .build();

        logger.log(&entry(Severity::Info));
        logger.debug("nope");
        crate::warn!(logger, "nor this {}", 1);

        assert_eq!(pool.stats().nodes_allocated(), 0);
        assert_eq!(logger.metrics().filtered_count(), 0);
        assert_eq!(logger.metrics().total_logged(), 0);
        assert!(sink.contents().is_empty());

        logger.error("kept");
        assert_eq!(logger.metrics().total_logged(), 1);
    }

    #[test]
    fn test_add_remove_idempotent() {
        let logger = Logger::builder("SET").build();
        let sink: Arc<dyn Sink> = Arc::new(MemorySink::new());

        logger.add_sink(Arc::clone(&sink));
        logger.add_sink(Arc::clone(&sink));
        assert_eq!(logger.sink_count(), 1);

        logger.remove_sink(&sink);
        logger.remove_sink(&sink);
        assert_eq!(logger.sink_count(), 0);
    }

    #[test]
    fn test_fanout_in_attachment_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        struct Recording {
            core: SinkCore,
            tag: &'static str,
            order: Arc<parking_lot::Mutex<Vec<&'static str>>>,
        }

        impl Sink for Recording {
            fn core(&self) -> &SinkCore {
                &self.core
            }
            fn write(&self, _bytes: &[u8]) -> Result<()> {
                self.order.lock().push(self.tag);
                Ok(())
            }
            fn flush(&self) -> Result<()> {
                Ok(())
            }
            fn name(&self) -> &str {
                self.tag
            }
        }

        let logger = Logger::builder("ORDER").build();
        for tag in ["first", "second", "third"] {
            logger.add_sink(Arc::new(Recording {
                core: SinkCore::new(),
                tag,
                order: Arc::clone(&order),
            }));
        }

        logger.log(&entry(Severity::Warn));
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failing_sink_does_not_block_others() {
        let memory = Arc::new(MemorySink::new());
        let logger = Logger::builder("FAILOVER")
            .sink(Arc::new(FailingSink {
                core: SinkCore::new(),
                panic: false,
            }))
            .sink(Arc::new(FailingSink {
                core: SinkCore::new(),
                panic: true,
            }))
            .sink(memory.clone())
            .build();

        logger.log(&entry(Severity::Error));

        assert_eq!(memory.lines().len(), 1);
        assert_eq!(logger.metrics().sink_failures(), 2);
        assert_eq!(logger.metrics().total_logged(), 1);
        assert!(logger.flush().is_err());
    }

    #[test]
    fn test_log_message_captures_location() {
        let memory = Arc::new(MemorySink::new());
        let logger = Logger::builder("CALLER").sink(memory.clone()).build();

        logger.info("hello");
        logger.debug("filtered");

        let lines = memory.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("[ INFO] CALLER "));
        assert!(lines[0].contains("core/logger.rs:"));
        assert!(lines[0].ends_with(" hello"));
    }

    #[test]
    fn test_level_change_visible_across_threads() {
        let logger = Arc::new(Logger::builder("SHARED").level(Severity::Fatal).build());
        logger.set_level(Severity::Trace);

        let remote = Arc::clone(&logger);
        let seen = thread::spawn(move || remote.should_log(Severity::Debug))
            .join()
            .unwrap();
        assert!(seen);
    }
}
