//! # Log events emitted by the supervision core.
//!
//! Every observable thing the core does — a line of child-process output, a
//! lifecycle transition, a snapshot export or deletion — becomes a
//! [`LogEvent`] published on the [`LogBus`](crate::events::LogBus). Events
//! are transient: they exist only for the duration of delivery to attached
//! observers and are never persisted.
//!
//! ## Ordering guarantees
//! Each event carries a globally unique sequence number (`seq`) that
//! increases monotonically. Receivers observe events in publish order; `seq`
//! restores the exact order if events are ever re-buffered downstream.
//!
//! ## Example
//! ```rust
//! use emuvisor::{LogEvent, StreamTag};
//!
//! let ev = LogEvent::stderr("permission denied");
//! assert_eq!(ev.stream, StreamTag::Stderr);
//! assert_eq!(&*ev.text, "permission denied");
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Which channel an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTag {
    /// A line read from the supervised process's stdout pipe.
    Stdout,
    /// A line read from the supervised process's stderr pipe.
    Stderr,
    /// A message from the supervision core itself: state transitions,
    /// process exits, snapshot exports and deletions, scheduler failures.
    Lifecycle,
}

impl StreamTag {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamTag::Stdout => "stdout",
            StreamTag::Stderr => "stderr",
            StreamTag::Lifecycle => "lifecycle",
        }
    }
}

/// One line of observable output.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for display; ordering comes from `seq`)
/// - `stream`: which channel produced the line
/// - `text`: the line itself, without a trailing newline
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Channel classification.
    pub stream: StreamTag,
    /// Line content (shared, cheap to clone across subscribers).
    pub text: Arc<str>,
}

impl LogEvent {
    /// Creates a new event with the current timestamp and next sequence number.
    pub fn new(stream: StreamTag, text: impl Into<Arc<str>>) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            stream,
            text: text.into(),
        }
    }

    /// Creates a stdout line event.
    #[inline]
    pub fn stdout(text: impl Into<Arc<str>>) -> Self {
        Self::new(StreamTag::Stdout, text)
    }

    /// Creates a stderr line event.
    #[inline]
    pub fn stderr(text: impl Into<Arc<str>>) -> Self {
        Self::new(StreamTag::Stderr, text)
    }

    /// Creates a lifecycle event.
    #[inline]
    pub fn lifecycle(text: impl Into<Arc<str>>) -> Self {
        Self::new(StreamTag::Lifecycle, text)
    }

    #[inline]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self.stream, StreamTag::Lifecycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = LogEvent::stdout("a");
        let b = LogEvent::stderr("b");
        let c = LogEvent::lifecycle("c");
        assert!(a.seq < b.seq);
        assert!(b.seq < c.seq);
    }

    #[test]
    fn test_stream_labels() {
        assert_eq!(StreamTag::Stdout.as_str(), "stdout");
        assert_eq!(StreamTag::Stderr.as_str(), "stderr");
        assert_eq!(StreamTag::Lifecycle.as_str(), "lifecycle");
    }
}
