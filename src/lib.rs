//! # ldgr
//!
//! A low-latency logging core.
//!
//! ## Features
//!
//! - **Cheap rejection**: every logger and sink carries an atomic severity
//!   gate, checked before any copy or lock
//! - **Pooled snapshots**: entries are copied into reference-counted buffers
//!   recycled through a [`BufferPool`]
//! - **Cached formatting**: the calendar prefix is rendered once per second
//! - **Fan-out**: a [`Logger`] delivers each snapshot to all of its sinks,
//!   isolating failing ones
//! - **Registry**: named loggers created on first use, process-wide or
//!   injected
//!
//! ## Example
//!
//! ```
//! use ldgr::prelude::*;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(MemorySink::new());
//! let registry = LogRegistry::builder()
//!     .default_sink(sink.clone())
//!     .build();
//!
//! let net = registry.get("NET");
//! ldgr::info!(net, "listening on port {}", 8080);
//!
//! assert!(sink.contents().contains("[ INFO] NET "));
//! assert!(sink.contents().ends_with("listening on port 8080\n"));
//! ```

pub mod core;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        BufferFactory, BufferPool, Formatter, HeapBufferFactory, LogEntry, LogRegistry, Logger,
        LoggerBuilder, LoggerError, LoggerMetrics, PoolLimits, RegistryConfig, Result, Severity,
        Sink, SinkCore, Snapshot,
    };
    pub use crate::sinks::{AsyncSink, ConsoleSink, ConsoleTarget, FileSink, MemorySink, OverflowPolicy};
}

pub use core::{
    logger, root_logger, BufferFactory, BufferPool, DecomposedTime, Formatter, FormatterKind,
    HeapBufferFactory, LogBuffer, LogEntry, LogRegistry, Logger, LoggerBuilder, LoggerError,
    LoggerMetrics, PoolLimits, PoolStats, RegistryBuilder, RegistryConfig, Result, SecondCache,
    Severity, SeverityGate, SharedBuffer, Sink, SinkCore, Snapshot, DEFAULT_LOGGER_LEVEL,
    ROOT_LOGGER_NAME,
};
pub use sinks::{
    AsyncSink, ConsoleSink, ConsoleTarget, FileSink, MemorySink, OverflowPolicy,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
