//! Sink implementations

pub mod async_sink;
pub mod console;
pub mod file;
pub mod memory;
pub mod overflow;

pub use async_sink::{
    AsyncSink, AsyncSinkBuilder, AsyncSinkStats, DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use console::{stderr_sink, stdout_sink, ConsoleSink, ConsoleTarget};
pub use file::FileSink;
pub use memory::MemorySink;
pub use overflow::{OverflowCallback, OverflowPolicy};
