//! Asynchronous sink adapter
//!
//! [`AsyncSink`] moves the formatting and writing of another sink onto a
//! dedicated worker thread. The logging thread only clones the snapshot
//! (a reference-count bump on its pooled buffer) and pushes it onto a
//! bounded channel; the buffer returns to its pool once the worker is done
//! with it.

use super::overflow::{OverflowCallback, OverflowPolicy};
use crate::core::{
    entry::Snapshot, sink::SinkCore, LoggerError, Result, Severity, Sink,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default timeout for draining the queue on shutdown or flush
///
/// Used by `Drop`. Call [`AsyncSink::shutdown`] directly for a different
/// timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default queue capacity, in snapshots
pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;

enum Command {
    Record(Snapshot),
    Raw(Vec<u8>),
    Flush(Sender<Result<()>>),
}

impl Command {
    fn severity(&self) -> Option<Severity> {
        match self {
            Command::Record(snapshot) => Some(snapshot.severity()),
            _ => None,
        }
    }
}

/// Queue counters for an [`AsyncSink`]
#[derive(Debug, Default)]
pub struct AsyncSinkStats {
    enqueued: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    blocked: AtomicU64,
    critical_preserved: AtomicU64,
    failures: AtomicU64,
}

impl AsyncSinkStats {
    /// Commands accepted onto the queue
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Snapshots handed to the inner sink
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Commands discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Times a producer waited for queue space
    pub fn blocked(&self) -> u64 {
        self.blocked.load(Ordering::Relaxed)
    }

    /// Error and fatal snapshots written synchronously on overflow
    pub fn critical_preserved(&self) -> u64 {
        self.critical_preserved.load(Ordering::Relaxed)
    }

    /// Inner sink errors and panics
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Dropped commands as a percentage of everything offered
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped() as f64;
        let total = self.enqueued() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            dropped / total * 100.0
        }
    }
}

/// Runs another sink on a worker thread behind a bounded queue.
///
/// The adapter has its own level gate, checked before enqueueing; the inner
/// sink keeps its own gate and formatter, applied on the worker.
///
/// # Example
///
/// ```
/// use ldgr::prelude::*;
/// use std::sync::Arc;
///
/// let memory = Arc::new(MemorySink::new());
/// let sink = Arc::new(AsyncSink::new(memory.clone()).unwrap());
/// let logger = Logger::builder("BG").sink(sink.clone()).build();
///
/// logger.info("queued");
/// logger.flush().unwrap();
/// assert_eq!(memory.lines().len(), 1);
/// ```
pub struct AsyncSink {
    core: SinkCore,
    name: String,
    inner: Arc<dyn Sink>,
    sender: RwLock<Option<Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    preserve_critical: bool,
    stats: Arc<AsyncSinkStats>,
}

impl AsyncSink {
    /// Wrap `inner` with the default capacity and policy.
    pub fn new(inner: Arc<dyn Sink>) -> Result<Self> {
        Self::builder(inner).build()
    }

    #[must_use]
    pub fn builder(inner: Arc<dyn Sink>) -> AsyncSinkBuilder {
        AsyncSinkBuilder::new(inner)
    }

    pub fn inner(&self) -> &Arc<dyn Sink> {
        &self.inner
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn stats(&self) -> &AsyncSinkStats {
        &self.stats
    }

    /// Commands currently waiting for the worker
    pub fn queue_len(&self) -> usize {
        self.sender.read().as_ref().map_or(0, Sender::len)
    }

    pub fn is_running(&self) -> bool {
        self.sender.read().is_some()
    }

    /// Close the queue and wait up to `timeout` for the worker to drain it.
    ///
    /// Returns `true` if the worker finished in time. Later calls are no-ops
    /// that return `true`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        drop(self.sender.write().take());

        let Some(handle) = self.worker.lock().take() else {
            return true;
        };

        let start = Instant::now();
        let finished = loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!(
                        "[LOGGER ERROR] Async sink '{}' worker panicked during shutdown: {:?}",
                        self.name, e
                    );
                }
                break true;
            }
            if start.elapsed() >= timeout {
                eprintln!(
                    "[LOGGER WARNING] Async sink '{}' worker did not finish within {:?} timeout. \
                     Some logs may be lost.",
                    self.name, timeout
                );
                break false;
            }
            thread::sleep(Duration::from_millis(10));
        };

        let dropped = self.stats.dropped();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Async sink '{}' shut down with {} dropped logs (drop rate: {:.2}%)",
                self.name,
                dropped,
                self.stats.drop_rate()
            );
        }
        finished
    }

    fn send(&self, command: Command) -> Result<()> {
        // The guard must be released before any blocking send, or `shutdown`
        // could not take the write lock until the queue drains.
        let (sender, command) = {
            let guard = self.sender.read();
            let sender = guard
                .as_ref()
                .ok_or_else(|| LoggerError::sink_stopped(self.name.as_str()))?;

            match sender.try_send(command) {
                Ok(()) => {
                    self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Err(TrySendError::Full(command)) => (sender.clone(), command),
                Err(TrySendError::Disconnected(_)) => return Err(LoggerError::ChannelSendError),
            }
        };
        self.handle_overflow(&sender, command)
    }

    fn handle_overflow(&self, sender: &Sender<Command>, command: Command) -> Result<()> {
        if self.preserve_critical && command.severity().is_some_and(|s| s >= Severity::Error) {
            if let Command::Record(snapshot) = command {
                self.stats.critical_preserved.fetch_add(1, Ordering::Relaxed);
                deliver(&self.inner, &snapshot, &self.stats, &self.name);
            }
            return Ok(());
        }

        match self.policy {
            OverflowPolicy::DropNewest => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            OverflowPolicy::AlertAndDrop => {
                self.alert_and_drop();
                Ok(())
            }
            OverflowPolicy::Block => {
                self.stats.blocked.fetch_add(1, Ordering::Relaxed);
                sender
                    .send(command)
                    .map_err(|_| LoggerError::ChannelSendError)?;
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            OverflowPolicy::BlockWithTimeout(timeout) => {
                self.stats.blocked.fetch_add(1, Ordering::Relaxed);
                match sender.send_timeout(command, timeout) {
                    Ok(()) => {
                        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }
                    Err(SendTimeoutError::Timeout(_)) => {
                        self.alert_and_drop();
                        Ok(())
                    }
                    Err(SendTimeoutError::Disconnected(_)) => Err(LoggerError::ChannelSendError),
                }
            }
        }
    }

    fn alert_and_drop(&self) {
        let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;

        // Alert on first drop and periodically thereafter
        if dropped == 1 || dropped % 1000 == 0 {
            eprintln!(
                "[LOGGER WARNING] Async sink '{}' queue full, {} logs dropped. \
                 Consider increasing capacity or using a different overflow policy.",
                self.name, dropped
            );
            if let Some(ref callback) = self.on_overflow {
                callback(dropped);
            }
        }
    }
}

fn run_worker(
    receiver: Receiver<Command>,
    inner: Arc<dyn Sink>,
    stats: Arc<AsyncSinkStats>,
    name: String,
) {
    for command in receiver.iter() {
        match command {
            Command::Record(snapshot) => deliver(&inner, &snapshot, &stats, &name),
            Command::Raw(bytes) => {
                if let Err(e) = inner.write(&bytes) {
                    eprintln!("[LOGGER ERROR] Async sink '{}' write failed: {}", name, e);
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                }
            }
            Command::Flush(ack) => {
                let _ = ack.send(inner.flush());
            }
        }
    }

    if let Err(e) = inner.flush() {
        eprintln!("[LOGGER ERROR] Async sink '{}' failed to flush on exit: {}", name, e);
    }
}

fn deliver(inner: &Arc<dyn Sink>, snapshot: &Snapshot, stats: &AsyncSinkStats, name: &str) {
    match panic::catch_unwind(AssertUnwindSafe(|| inner.log(snapshot))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!(
                "[LOGGER ERROR] Async sink '{}' inner sink '{}' failed: {}",
                name,
                inner.name(),
                e
            );
            stats.failures.fetch_add(1, Ordering::Relaxed);
        }
        Err(_) => {
            eprintln!(
                "[LOGGER CRITICAL] Async sink '{}' inner sink '{}' panicked. \
                 The worker continues.",
                name,
                inner.name()
            );
            stats.failures.fetch_add(1, Ordering::Relaxed);
        }
    }
    stats.processed.fetch_add(1, Ordering::Relaxed);
}

impl Sink for AsyncSink {
    fn core(&self) -> &SinkCore {
        &self.core
    }

    fn log(&self, snapshot: &Snapshot) -> Result<()> {
        if !self.should_log(snapshot.severity()) {
            return Ok(());
        }
        self.send(Command::Record(snapshot.clone()))
    }

    /// Queue an already rendered line for the inner sink's `write`.
    fn write(&self, bytes: &[u8]) -> Result<()> {
        self.send(Command::Raw(bytes.to_vec()))
    }

    /// Wait until everything queued before this call reached the inner sink,
    /// then flush it.
    fn flush(&self) -> Result<()> {
        let sender = match self.sender.read().as_ref() {
            Some(sender) => sender.clone(),
            None => return self.inner.flush(),
        };

        let (ack_tx, ack_rx) = bounded(1);
        match sender.send_timeout(Command::Flush(ack_tx), DEFAULT_SHUTDOWN_TIMEOUT) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                return Err(LoggerError::other(format!(
                    "async sink '{}' flush not accepted within {:?}",
                    self.name, DEFAULT_SHUTDOWN_TIMEOUT
                )))
            }
            Err(SendTimeoutError::Disconnected(_)) => return Err(LoggerError::ChannelSendError),
        }

        match ack_rx.recv_timeout(DEFAULT_SHUTDOWN_TIMEOUT) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(LoggerError::other(format!(
                "async sink '{}' flush timed out after {:?}",
                self.name, DEFAULT_SHUTDOWN_TIMEOUT
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(LoggerError::ChannelSendError),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for AsyncSink {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

impl fmt::Debug for AsyncSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSink")
            .field("name", &self.name)
            .field("inner", &self.inner.name())
            .field("policy", &self.policy)
            .field("queue_len", &self.queue_len())
            .finish()
    }
}

/// Builder for [`AsyncSink`]
pub struct AsyncSinkBuilder {
    inner: Arc<dyn Sink>,
    name: Option<String>,
    capacity: usize,
    policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    preserve_critical: bool,
}

impl AsyncSinkBuilder {
    pub fn new(inner: Arc<dyn Sink>) -> Self {
        Self {
            inner,
            name: None,
            capacity: DEFAULT_QUEUE_CAPACITY,
            policy: OverflowPolicy::default(),
            on_overflow: None,
            preserve_critical: true,
        }
    }

    /// Defaults to `async-<inner name>`.
    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Queue capacity in snapshots; clamped to at least 1.
    #[must_use = "builder methods return a new value"]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    /// Write `Error` and `Fatal` snapshots synchronously instead of applying
    /// the overflow policy. On by default; such lines may appear out of order.
    #[must_use = "builder methods return a new value"]
    pub fn preserve_critical(mut self, preserve: bool) -> Self {
        self.preserve_critical = preserve;
        self
    }

    pub fn build(self) -> Result<AsyncSink> {
        let name = self
            .name
            .unwrap_or_else(|| format!("async-{}", self.inner.name()));
        let (sender, receiver) = bounded(self.capacity);
        let stats = Arc::new(AsyncSinkStats::default());

        let worker = {
            let inner = Arc::clone(&self.inner);
            let stats = Arc::clone(&stats);
            let worker_name = name.clone();
            thread::Builder::new()
                .name(format!("ldgr-{}", name))
                .spawn(move || run_worker(receiver, inner, stats, worker_name))
                .map_err(|e| LoggerError::io_operation("spawning async sink worker", name.clone(), e))?
        };

        Ok(AsyncSink {
            core: SinkCore::new(),
            name,
            inner: self.inner,
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            policy: self.policy,
            on_overflow: self.on_overflow,
            preserve_critical: self.preserve_critical,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BufferPool, Logger};
    use crate::sinks::MemorySink;

    /// Blocks on writes of lines ending in "hold" until released.
    struct GateSink {
        core: SinkCore,
        entered: Sender<()>,
        release: Receiver<()>,
        memory: MemorySink,
    }

    struct Gate {
        sink: Arc<GateSink>,
        entered: Receiver<()>,
        release: Sender<()>,
    }

    impl GateSink {
        fn new() -> Gate {
            let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
            let (release_tx, release_rx) = bounded(0);
            let sink = Arc::new(Self {
                core: SinkCore::new(),
                entered: entered_tx,
                release: release_rx,
                memory: MemorySink::new(),
            });
            Gate {
                sink,
                entered: entered_rx,
                release: release_tx,
            }
        }
    }

    impl Sink for GateSink {
        fn core(&self) -> &SinkCore {
            &self.core
        }
        fn write(&self, bytes: &[u8]) -> Result<()> {
            if bytes.ends_with(b"hold\n") {
                let _ = self.entered.send(());
                let _ = self.release.recv();
            }
            self.memory.write(bytes)
        }
        fn flush(&self) -> Result<()> {
            Ok(())
        }
        fn name(&self) -> &str {
            "gate"
        }
    }

    #[test]
    fn test_delivers_in_order_after_flush() {
        let memory = Arc::new(MemorySink::new());
        let sink = Arc::new(AsyncSink::new(memory.clone()).unwrap());
        let logger = Logger::builder("ASYNC").sink(sink.clone()).build();

        for i in 0..100 {
            logger.info(format!("message {}", i));
        }
        logger.flush().unwrap();

        let lines = memory.lines();
        assert_eq!(lines.len(), 100);
        for (i, line) in lines.iter().enumerate() {
            assert!(line.ends_with(&format!("message {}", i)));
        }
        assert_eq!(sink.stats().enqueued(), 100);
        assert_eq!(sink.stats().processed(), 100);
        assert_eq!(sink.name(), "async-memory");
    }

    #[test]
    fn test_buffers_return_to_pool_after_worker() {
        let pool = BufferPool::new();
        let memory = Arc::new(MemorySink::new());
        let sink = Arc::new(AsyncSink::new(memory.clone()).unwrap());
        let logger = Logger::builder("POOLED")
            .sink(sink.clone())
            .buffer_factory(Arc::new(pool.clone()))
            .build();

        for _ in 0..20 {
            logger.warn("recycled");
        }
        logger.flush().unwrap();

        assert_eq!(memory.lines().len(), 20);
        assert_eq!(pool.free_nodes() as u64, pool.stats().nodes_allocated());
    }

    #[test]
    fn test_drop_newest_when_full() {
        let gate = GateSink::new();
        let sink = Arc::new(
            AsyncSink::builder(gate.sink.clone())
                .capacity(1)
                .overflow_policy(OverflowPolicy::DropNewest)
                .build()
                .unwrap(),
        );
        let logger = Logger::builder("FULL").sink(sink.clone()).build();

        logger.info("hold");
        gate.entered.recv().unwrap();
        for _ in 0..9 {
            logger.info("spill");
        }

        assert_eq!(sink.stats().enqueued(), 2);
        assert_eq!(sink.stats().dropped(), 8);
        assert_eq!(sink.queue_len(), 1);

        drop(gate.release);
        sink.flush().unwrap();
        assert_eq!(gate.sink.memory.lines().len(), 2);
    }

    #[test]
    fn test_critical_preserved_on_overflow() {
        let gate = GateSink::new();
        let sink = Arc::new(
            AsyncSink::builder(gate.sink.clone())
                .capacity(1)
                .overflow_policy(OverflowPolicy::DropNewest)
                .build()
                .unwrap(),
        );
        let logger = Logger::builder("CRIT").sink(sink.clone()).build();

        logger.info("hold");
        gate.entered.recv().unwrap();
        logger.info("fill");
        logger.error("urgent");

        assert_eq!(sink.stats().critical_preserved(), 1);
        assert_eq!(sink.stats().dropped(), 0);
        assert!(gate.sink.memory.contents().contains("urgent"));

        drop(gate.release);
        sink.flush().unwrap();
        assert_eq!(gate.sink.memory.lines().len(), 3);
    }

    #[test]
    fn test_block_with_timeout_drops() {
        let gate = GateSink::new();
        let sink = Arc::new(
            AsyncSink::builder(gate.sink.clone())
                .capacity(1)
                .overflow_policy(OverflowPolicy::BlockWithTimeout(Duration::from_millis(5)))
                .build()
                .unwrap(),
        );
        let logger = Logger::builder("TIMEOUT").sink(sink.clone()).build();

        logger.info("hold");
        gate.entered.recv().unwrap();
        for _ in 0..3 {
            logger.info("wait");
        }

        assert_eq!(sink.stats().blocked(), 2);
        assert_eq!(sink.stats().dropped(), 2);

        drop(gate.release);
        sink.flush().unwrap();
    }

    #[test]
    fn test_sink_level_checked_before_enqueue() {
        let memory = Arc::new(MemorySink::new());
        let sink = Arc::new(AsyncSink::new(memory.clone()).unwrap());
        sink.set_level(Severity::Error);
        let logger = Logger::builder("GATED").sink(sink.clone()).build();

        logger.info("skipped");
        logger.fatal("kept");
        logger.flush().unwrap();

        assert_eq!(sink.stats().enqueued(), 1);
        assert_eq!(memory.lines().len(), 1);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let memory = Arc::new(MemorySink::new());
        let sink = Arc::new(AsyncSink::new(memory.clone()).unwrap());
        let logger = Logger::builder("DRAIN").sink(sink.clone()).build();

        for i in 0..50 {
            logger.info(format!("line {}", i));
        }
        assert!(sink.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
        assert!(!sink.is_running());
        assert_eq!(memory.lines().len(), 50);

        logger.info("after shutdown");
        assert_eq!(logger.metrics().sink_failures(), 1);
        assert!(sink.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
        assert!(sink.flush().is_ok());
    }

    #[test]
    fn test_shutdown_honors_timeout_with_blocked_producer() {
        let gate = GateSink::new();
        let sink = Arc::new(
            AsyncSink::builder(gate.sink.clone())
                .capacity(1)
                .overflow_policy(OverflowPolicy::Block)
                .build()
                .unwrap(),
        );
        let logger = Arc::new(Logger::builder("STUCK").sink(sink.clone()).build());

        logger.info("hold");
        gate.entered.recv().unwrap();
        logger.info("fill");

        let producer = {
            let logger = Arc::clone(&logger);
            thread::spawn(move || logger.info("blocked"))
        };
        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.stats().blocked() == 0 {
            assert!(Instant::now() < deadline, "producer never blocked");
            thread::sleep(Duration::from_millis(1));
        }

        let start = Instant::now();
        assert!(!sink.shutdown(Duration::from_millis(50)));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!sink.is_running());

        drop(gate.release);
        producer.join().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while gate.sink.memory.lines().len() < 3 {
            assert!(Instant::now() < deadline, "queued lines never drained");
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Panics in `flush`, taking the worker thread down with it.
    struct PanicOnFlushSink {
        core: SinkCore,
    }

    impl Sink for PanicOnFlushSink {
        fn core(&self) -> &SinkCore {
            &self.core
        }
        fn write(&self, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }
        fn flush(&self) -> Result<()> {
            panic!("flush exploded");
        }
        fn name(&self) -> &str {
            "panic-flush"
        }
    }

    #[test]
    fn test_dead_worker_reports_channel_error() {
        let inner = Arc::new(PanicOnFlushSink {
            core: SinkCore::new(),
        });
        let sink = AsyncSink::new(inner).unwrap();

        let err = sink.flush().unwrap_err();
        assert!(matches!(err, LoggerError::ChannelSendError));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !sink
            .worker
            .lock()
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
        {
            assert!(Instant::now() < deadline, "worker never exited");
            thread::sleep(Duration::from_millis(1));
        }

        let err = sink.write(b"orphaned\n").unwrap_err();
        assert!(matches!(err, LoggerError::ChannelSendError));
        assert!(sink.is_running());
        assert!(sink.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
    }

    #[test]
    fn test_raw_write_is_queued() {
        let memory = Arc::new(MemorySink::new());
        let sink = AsyncSink::new(memory.clone()).unwrap();

        sink.write(b"raw line\n").unwrap();
        sink.flush().unwrap();

        assert_eq!(memory.contents(), "raw line\n");
    }
}
