//! Console sink writing to stdout or stderr

use crate::core::{entry::Snapshot, pool::LogBuffer, sink::SinkCore, Result, Sink};
#[cfg(feature = "console")]
use colored::Colorize;
use lazy_static::lazy_static;
use std::io::{self, Write};
use std::sync::Arc;

/// Standard stream a [`ConsoleSink`] writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTarget {
    Stdout,
    Stderr,
}

lazy_static! {
    static ref STDOUT_SINK: Arc<ConsoleSink> = Arc::new(ConsoleSink::new(ConsoleTarget::Stdout));
    static ref STDERR_SINK: Arc<ConsoleSink> = Arc::new(ConsoleSink::new(ConsoleTarget::Stderr));
}

/// Process-wide uncolored stdout sink.
pub fn stdout_sink() -> Arc<ConsoleSink> {
    Arc::clone(&STDOUT_SINK)
}

/// Process-wide uncolored stderr sink; the default sink of every registry.
pub fn stderr_sink() -> Arc<ConsoleSink> {
    Arc::clone(&STDERR_SINK)
}

#[derive(Debug)]
pub struct ConsoleSink {
    core: SinkCore,
    target: ConsoleTarget,
    use_colors: bool,
}

impl ConsoleSink {
    pub fn new(target: ConsoleTarget) -> Self {
        Self {
            core: SinkCore::new(),
            target,
            use_colors: false,
        }
    }

    /// Color whole lines by severity. Ignored without the `console` feature.
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }

    pub fn uses_colors(&self) -> bool {
        self.use_colors
    }

    fn write_to_target(&self, bytes: &[u8]) -> io::Result<()> {
        match self.target {
            ConsoleTarget::Stdout => io::stdout().lock().write_all(bytes),
            ConsoleTarget::Stderr => io::stderr().lock().write_all(bytes),
        }
    }

    #[cfg(feature = "console")]
    fn write_colored(&self, line: &[u8], snapshot: &Snapshot) -> Result<()> {
        let text = String::from_utf8_lossy(line);
        let body = text.strip_suffix('\n').unwrap_or(&text);
        let colored = format!("{}\n", body.color(snapshot.severity().color_code()));
        self.write(colored.as_bytes())
    }
}

impl Sink for ConsoleSink {
    fn core(&self) -> &SinkCore {
        &self.core
    }

    fn log(&self, snapshot: &Snapshot) -> Result<()> {
        if !self.should_log(snapshot.severity()) {
            return Ok(());
        }
        let mut line = LogBuffer::new();
        self.formatter().format(&mut line, snapshot);

        #[cfg(feature = "console")]
        if self.use_colors {
            return self.write_colored(&line, snapshot);
        }
        self.write(&line)
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        self.write_to_target(bytes)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        match self.target {
            ConsoleTarget::Stdout => io::stdout().flush()?,
            ConsoleTarget::Stderr => io::stderr().flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        match self.target {
            ConsoleTarget::Stdout => "stdout",
            ConsoleTarget::Stderr => "stderr",
        }
    }
}
