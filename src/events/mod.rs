//! Log events: data model and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to push
//! process output and lifecycle messages to observers in real time.
//!
//! ## Contents
//! - [`StreamTag`], [`LogEvent`] — event classification and payload
//! - [`LogBus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the stdout/stderr reader tasks, `ProcessSupervisor`,
//!   `SnapshotStore`, `SnapshotScheduler`.
//! - **Consumers**: the real-time transport layer (out of scope), the
//!   built-in [`LogWriter`](crate::LogWriter), and tests.

mod bus;
mod event;

pub use bus::LogBus;
pub use event::{LogEvent, StreamTag};
