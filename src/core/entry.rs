//! Log entries and their owned snapshots
//!
//! A [`LogEntry`] borrows everything from the call site and lives only for
//! the duration of the log call. [`Snapshot::capture`] copies it into a
//! single pooled buffer so sinks can read it later or on another thread.

use super::pool::{BufferFactory, SharedBuffer};
use super::severity::Severity;
use chrono::{DateTime, Datelike, Local, NaiveDateTime, Timelike, Utc};
use std::fmt;
use std::ops::Range;

/// One log event as seen at the call site. All views are borrowed.
#[derive(Debug, Clone, Copy)]
pub struct LogEntry<'a> {
    pub severity: Severity,
    pub name: &'a [u8],
    pub file: &'a [u8],
    pub line: &'a [u8],
    pub timestamp: DateTime<Utc>,
    pub message: &'a [u8],
}

impl<'a> LogEntry<'a> {
    /// Entry stamped with the current time and no source location.
    pub fn new<N, M>(severity: Severity, name: &'a N, message: &'a M) -> Self
    where
        N: AsRef<[u8]> + ?Sized,
        M: AsRef<[u8]> + ?Sized,
    {
        Self {
            severity,
            name: name.as_ref(),
            file: &[],
            line: &[],
            timestamp: Utc::now(),
            message: message.as_ref(),
        }
    }

    #[must_use]
    pub fn with_location<F, L>(mut self, file: &'a F, line: &'a L) -> Self
    where
        F: AsRef<[u8]> + ?Sized,
        L: AsRef<[u8]> + ?Sized,
    {
        self.file = file.as_ref();
        self.line = line.as_ref();
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Split the timestamp into calendar fields, in UTC or local time.
    pub fn decompose(&self, local_time: bool) -> DecomposedTime {
        DecomposedTime::from_datetime(&self.timestamp, local_time)
    }

    fn text_len(&self) -> usize {
        self.name.len() + self.file.len() + self.line.len() + self.message.len()
    }
}

/// Calendar breakdown of a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecomposedTime {
    pub year: i32,
    /// 1..=12
    pub month: u32,
    /// 1..=31
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// 0..=999_999
    pub microseconds: u32,
    pub is_local: bool,
    /// Seconds since the Unix epoch, independent of `is_local`.
    pub epoch_second: i64,
}

impl DecomposedTime {
    pub fn from_datetime(timestamp: &DateTime<Utc>, local_time: bool) -> Self {
        let naive: NaiveDateTime = if local_time {
            timestamp.with_timezone(&Local).naive_local()
        } else {
            timestamp.naive_utc()
        };
        Self {
            year: naive.year(),
            month: naive.month(),
            day: naive.day(),
            hour: naive.hour(),
            minute: naive.minute(),
            second: naive.second(),
            // Leap seconds report up to 1_999_999.
            microseconds: timestamp.timestamp_subsec_micros().min(999_999),
            is_local: local_time,
            epoch_second: timestamp.timestamp(),
        }
    }

    /// Microseconds rounded to the nearest millisecond.
    pub fn milliseconds(&self) -> u32 {
        self.microseconds / 1000 + u32::from(self.microseconds % 1000 >= 500)
    }
}

/// Owned copy of a [`LogEntry`].
///
/// The four text fields live back to back (name, file, line, message) in one
/// [`SharedBuffer`]. Cloning is a reference-count bump; the buffer returns to
/// its pool when the last clone drops.
#[derive(Clone)]
pub struct Snapshot {
    severity: Severity,
    buffer: SharedBuffer,
    name: Range<usize>,
    file: Range<usize>,
    line: Range<usize>,
    message: Range<usize>,
    time: DecomposedTime,
}

impl Snapshot {
    /// Copy `entry` into a buffer obtained from `factory`.
    pub fn capture(entry: &LogEntry<'_>, local_time: bool, factory: &dyn BufferFactory) -> Self {
        let mut buffer = factory.acquire();
        let mut ranges = [0..0, 0..0, 0..0, 0..0];

        if let Some(bytes) = buffer.get_mut() {
            bytes.clear();
            bytes.reserve_exact(entry.text_len());
            for (range, text) in ranges
                .iter_mut()
                .zip([entry.name, entry.file, entry.line, entry.message])
            {
                let start = bytes.len();
                bytes.extend_from_slice(text);
                *range = start..bytes.len();
            }
        } else {
            // A factory handed out a buffer that is still shared; copy into
            // a private one instead of writing through the alias.
            return Self::capture(entry, local_time, &super::pool::HeapBufferFactory);
        }

        let [name, file, line, message] = ranges;
        Self {
            severity: entry.severity,
            buffer,
            name,
            file,
            line,
            message,
            time: entry.decompose(local_time),
        }
    }

    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[inline]
    pub fn name(&self) -> &[u8] {
        &self.buffer[self.name.clone()]
    }

    #[inline]
    pub fn file(&self) -> &[u8] {
        &self.buffer[self.file.clone()]
    }

    #[inline]
    pub fn line(&self) -> &[u8] {
        &self.buffer[self.line.clone()]
    }

    #[inline]
    pub fn message(&self) -> &[u8] {
        &self.buffer[self.message.clone()]
    }

    #[inline]
    pub fn time(&self) -> &DecomposedTime {
        &self.time
    }

    /// The backing buffer holding all four text fields.
    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("severity", &self.severity)
            .field("name", &String::from_utf8_lossy(self.name()))
            .field("file", &String::from_utf8_lossy(self.file()))
            .field("line", &String::from_utf8_lossy(self.line()))
            .field("message", &String::from_utf8_lossy(self.message()))
            .field("time", &self.time)
            .finish()
    }
}
