//! Logging macros for ergonomic log message formatting.
//!
//! These macros check the logger's gate first, so rejected entries cost one
//! atomic load and no formatting. Accepted messages are formatted into an
//! inline [`LogBuffer`](crate::core::pool::LogBuffer) and logged with the
//! caller's file and line.
//!
//! # Examples
//!
//! ```
//! use ldgr::prelude::*;
//! use ldgr::info;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(MemorySink::new());
//! let logger = Logger::builder("SRV").sink(sink.clone()).build();
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! assert_eq!(sink.lines().len(), 2);
//! ```

/// Log a message at an explicit severity.
///
/// # Examples
///
/// ```
/// # use ldgr::prelude::*;
/// # let logger = Logger::builder("APP").sink(std::sync::Arc::new(MemorySink::new())).build();
/// use ldgr::log;
/// log!(logger, Severity::Info, "Simple message");
/// log!(logger, Severity::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $severity:expr, $($arg:tt)+) => {{
        let logger = &$logger;
        let severity: $crate::core::Severity = $severity;
        if logger.should_log(severity) {
            let mut message = $crate::core::pool::LogBuffer::new();
            let _ = ::std::io::Write::write_fmt(&mut message, ::std::format_args!($($arg)+));
            let entry = $crate::core::entry::LogEntry::new(severity, logger.name(), &message[..])
                .with_location(::std::file!(), ::std::concat!(::std::line!()));
            logger.log(&entry);
        } else {
            logger.record_filtered();
        }
    }};
}

/// Log a trace-level message.
///
/// # Examples
///
/// ```
/// # use ldgr::prelude::*;
/// # let logger = Logger::builder("APP").level(Severity::Trace).build();
/// use ldgr::trace;
/// trace!(logger, "Entering function: calculate()");
/// trace!(logger, "Variable value: {}", 42);
/// ```
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Severity::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Severity::Debug, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Severity::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Severity::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use ldgr::prelude::*;
/// # let logger = Logger::builder("DB").sink(std::sync::Arc::new(MemorySink::new())).build();
/// use ldgr::error;
/// error!(logger, "Failed to connect to database");
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Severity::Error, $($arg)+)
    };
}

/// Log a fatal-level message.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::Severity::Fatal, $($arg)+)
    };
}
