//! Core logging types: buffers, snapshots, formatting, sinks, loggers

pub mod config;
pub mod entry;
pub mod error;
pub mod fmtutil;
pub mod formatter;
pub mod logger;
pub mod metrics;
pub mod pool;
pub mod registry;
pub mod severity;
pub mod sink;

pub use config::RegistryConfig;
pub use entry::{DecomposedTime, LogEntry, Snapshot};
pub use error::{LoggerError, Result};
pub use formatter::{Formatter, FormatterKind, RenderFn, SecondCache};
pub use logger::{Logger, LoggerBuilder, DEFAULT_LOGGER_LEVEL};
pub use metrics::LoggerMetrics;
pub use pool::{
    BufferFactory, BufferPool, HeapBufferFactory, LogBuffer, PoolLimits, PoolStats, SharedBuffer,
};
pub use registry::{logger, root_logger, LogRegistry, RegistryBuilder, ROOT_LOGGER_NAME};
pub use severity::{Severity, SeverityGate};
pub use sink::{Sink, SinkCore};
