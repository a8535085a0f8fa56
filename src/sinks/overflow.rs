//! Overflow policies for the asynchronous sink queue
//!
//! When an [`AsyncSink`](super::AsyncSink) queue is full, the policy decides
//! what happens to the snapshot being enqueued.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Policy for handling a full queue
///
/// # Example
///
/// ```
/// use ldgr::sinks::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default behavior: alert and drop
/// let policy = OverflowPolicy::default();
/// assert_eq!(policy, OverflowPolicy::AlertAndDrop);
///
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the new snapshot and count it
    DropNewest,

    /// Wait until the worker makes room
    ///
    /// Applies backpressure to every logging thread.
    Block,

    /// Wait up to the timeout, then drop with an alert
    BlockWithTimeout(Duration),

    /// Drop, count, and warn on stderr on the first drop and every
    /// thousandth after it
    #[default]
    AlertAndDrop,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::AlertAndDrop => write!(f, "AlertAndDrop"),
        }
    }
}

/// Called with the running drop count whenever an alert fires.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;
