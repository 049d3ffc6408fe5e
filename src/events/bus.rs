//! # Broadcast bus for log events.
//!
//! [`LogBus`] is a thin wrapper around [`tokio::sync::broadcast`] that fans
//! out [`LogEvent`]s from the supervision core to every attached observer.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                    Subscribers (many):
//!   stdout reader ──┐                 ┌──► dashboard transport
//!   stderr reader ──┼──► LogBus ──────┼──► LogWriter (demo)
//!   supervisor    ──┤ (broadcast chan)└──► test probes
//!   snapshot store ─┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks or awaits; a slow
//!   observer can never stall the pipe-reading loops.
//! - **No history replay**: a receiver only observes events sent after it
//!   subscribed.
//! - **Bounded ring**: receivers that fall behind more than the channel
//!   capacity observe `RecvError::Lagged(n)` and skip the n oldest items.
//! - **Total order**: all receivers observe surviving events in the same
//!   relative publish order.
//! - **No persistence**: events published with no live receiver are dropped.

use tokio::sync::broadcast;

use super::event::LogEvent;

/// Broadcast channel for [`LogEvent`]s.
///
/// Cheap to clone (internally holds an `Arc`-backed sender); every component
/// of the core that needs to report something holds its own clone.
#[derive(Clone, Debug)]
pub struct LogBus {
    tx: broadcast::Sender<LogEvent>,
}

impl LogBus {
    /// Creates a new bus with the given ring-buffer capacity.
    ///
    /// Capacity is shared across all receivers (not per-subscriber) and is
    /// clamped to a minimum of 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<LogEvent>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no receivers the event is dropped; this function still
    /// returns immediately.
    pub fn publish(&self, ev: LogEvent) {
        let _ = self.tx.send(ev);
    }

    /// Shorthand for publishing a [`Lifecycle`](crate::StreamTag::Lifecycle)
    /// message.
    pub fn lifecycle(&self, text: impl Into<std::sync::Arc<str>>) {
        self.publish(LogEvent::lifecycle(text));
    }

    /// Creates a new receiver that observes subsequent events.
    ///
    /// Each call creates an independent receiver; dropping it unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.tx.subscribe()
    }

    /// Number of currently attached receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_sees_only_later_events() {
        let bus = LogBus::new(64);
        let _sink = bus.subscribe(); // keep the channel alive

        for i in 0..10 {
            bus.publish(LogEvent::stdout(format!("early-{i}")));
        }

        let mut rx = bus.subscribe();
        bus.publish(LogEvent::stdout("late-0"));
        bus.publish(LogEvent::stderr("late-1"));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(&*first.text, "late-0");
        assert_eq!(&*second.text, "late-1");
        assert!(rx.try_recv().is_err(), "no further events were published");
    }

    #[tokio::test]
    async fn test_publish_order_is_preserved() {
        let bus = LogBus::new(64);
        let mut rx = bus.subscribe();

        for i in 0..20 {
            bus.publish(LogEvent::stdout(format!("line-{i}")));
        }
        let mut prev_seq = None;
        for i in 0..20 {
            let ev = rx.recv().await.unwrap();
            assert_eq!(&*ev.text, &format!("line-{i}"));
            if let Some(p) = prev_seq {
                assert!(ev.seq > p);
            }
            prev_seq = Some(ev.seq);
        }
    }

    #[tokio::test]
    async fn test_publish_without_receivers_is_silent() {
        let bus = LogBus::new(4);
        bus.publish(LogEvent::lifecycle("nobody listening"));
        bus.lifecycle("still nobody");
    }
}
