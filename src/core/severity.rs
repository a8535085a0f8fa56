//! Severity definitions

use super::error::LoggerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Ordered log severity: `Off < Trace < Debug < Info < Warn < Error < Fatal`.
///
/// A gate at level `L` passes every severity `s` with `s >= L`, so `Off` is the
/// most permissive gate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
#[repr(u8)]
pub enum Severity {
    Off = 0,
    Trace = 1,
    Debug = 2,
    #[default]
    Info = 3,
    Warn = 4,
    Error = 5,
    Fatal = 6,
}

impl Severity {
    pub const ALL: [Severity; 7] = [
        Severity::Off,
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            Severity::Off => "OFF",
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Map a raw discriminant back to a severity; `None` for out-of-range values.
    #[inline]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Severity::Off),
            1 => Some(Severity::Trace),
            2 => Some(Severity::Debug),
            3 => Some(Severity::Info),
            4 => Some(Severity::Warn),
            5 => Some(Severity::Error),
            6 => Some(Severity::Fatal),
            _ => None,
        }
    }

    #[cfg(feature = "console")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            Severity::Off => White,
            Severity::Trace => BrightBlack,
            Severity::Debug => Blue,
            Severity::Info => Green,
            Severity::Warn => Yellow,
            Severity::Error => Red,
            Severity::Fatal => BrightRed,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for Severity {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OFF" => Ok(Severity::Off),
            "TRACE" => Ok(Severity::Trace),
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARN" | "WARNING" => Ok(Severity::Warn),
            "ERROR" => Ok(Severity::Error),
            "FATAL" => Ok(Severity::Fatal),
            _ => Err(LoggerError::InvalidLevel(s.to_string())),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = LoggerError;

    fn try_from(s: String) -> Result<Self, LoggerError> {
        s.parse()
    }
}

/// Lock-free severity gate shared by loggers and sinks.
///
/// Stores use `Release` and loads use `Acquire`, so a level change on one
/// thread is observed by `should_log` on every other thread without a lock.
#[derive(Debug)]
pub struct SeverityGate(AtomicU8);

impl SeverityGate {
    pub const fn new(level: Severity) -> Self {
        Self(AtomicU8::new(level as u8))
    }

    #[inline]
    pub fn level(&self) -> Severity {
        // Only `set` writes here, and it always stores a valid discriminant.
        Severity::from_u8(self.0.load(Ordering::Acquire)).unwrap_or(Severity::Off)
    }

    #[inline]
    pub fn set(&self, level: Severity) {
        self.0.store(level as u8, Ordering::Release);
    }

    #[inline]
    pub fn should_log(&self, severity: Severity) -> bool {
        severity as u8 >= self.0.load(Ordering::Acquire)
    }
}
