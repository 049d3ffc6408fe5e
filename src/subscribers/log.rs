//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] attaches to the bus and prints events to stdout in a
//! human-readable format.
//!
//! ## Output format
//! ```text
//! [stdout] ✔  firestore: Emulator started at http://0.0.0.0:8080
//! [stderr] Warning: …
//! [lifecycle] supervised process running (pid 4242)
//! ```
//!
//! Not intended for production use — the real-time transport layer consumes
//! the bus directly; this exists for development and the bundled demo.

use tokio::task::JoinHandle;

use crate::events::LogBus;

/// Prints every bus event to stdout until the bus closes.
pub struct LogWriter;

impl LogWriter {
    /// Subscribes to the bus and spawns the printing worker.
    ///
    /// Dropping the handle detaches the worker; aborting it stops output.
    pub fn attach(bus: &LogBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            use tokio::sync::broadcast::error::RecvError;
            loop {
                match rx.recv().await {
                    Ok(ev) => println!("[{}] {}", ev.stream.as_str(), ev.text),
                    Err(RecvError::Lagged(n)) => eprintln!("[emuvisor] log writer skipped {n} events"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogEvent;

    #[tokio::test]
    async fn test_writer_drains_until_bus_closes() {
        let bus = LogBus::new(8);
        let worker = LogWriter::attach(&bus);

        bus.publish(LogEvent::stdout("hello"));
        bus.lifecycle("bye");
        drop(bus);

        worker.await.unwrap();
    }
}
