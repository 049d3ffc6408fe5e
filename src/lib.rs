//! # emuvisor
//!
//! **emuvisor** is the supervision core behind a local-services emulator
//! dashboard: it starts and stops one long-running emulator process per
//! project, streams its output to observers in real time, snapshots its
//! on-disk state on a schedule, prunes old snapshots, and pre-flights the
//! TCP ports the process will bind before launch.
//!
//! The external tool is anything with the lifecycle contract "emits logs on
//! stdout/stderr and exits with a status code"; the defaults target the
//! Firebase CLI.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                  ┌───────────────────────────────────────────┐
//!   API calls ───► │  Orchestrator (facade)                    │
//!                  │  - PortArbiter (pre-flight)               │
//!                  │  - SnapshotStore (export/list/del/prune)  │
//!                  │  - ProcessSupervisor (state machine)      │
//!                  └──────┬──────────────┬─────────────────────┘
//!                         ▼              ▼
//!                  ┌──────────────┐  ┌────────────────────┐
//!                  │ child process│  │ SnapshotScheduler  │
//!                  │ (one, owned  │  │ (periodic timer +  │
//!                  │  by watcher) │  │  closing snapshot) │
//!                  └──┬───────┬───┘  └─────────┬──────────┘
//!                     │stdout │stderr          │ export/prune events
//!                     ▼       ▼                ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     LogBus (broadcast channel)                │
//! └──────────────┬──────────────────┬─────────────────────┬───────┘
//!                ▼                  ▼                     ▼
//!        dashboard transport   LogWriter (demo)       test probes
//! ```
//!
//! ### Lifecycle
//! ```text
//! Idle ──► Starting ──► Running ──► Stopping ──► Idle
//!             │            │
//!             │ (spawn     │ (unexpected exit)
//!             │  failure)  ▼
//!             └───────► CrashExited
//! ```
//! Only one session exists at a time: a start while
//! Starting/Running/Stopping fails fast, never queues, never spawns a
//! second child.
//!
//! ## Features
//! | Area              | Description                                              | Key types                              |
//! |-------------------|----------------------------------------------------------|----------------------------------------|
//! | **Lifecycle**     | Start/stop/crash handling for one external process.      | [`ProcessSupervisor`], [`Orchestrator`]|
//! | **Log fan-out**   | Real-time broadcast of output and lifecycle events.      | [`LogBus`], [`LogEvent`]               |
//! | **Snapshots**     | Scheduled + manual exports with retention pruning.       | [`SnapshotStore`], [`SnapshotScheduler`]|
//! | **Pre-flight**    | Port availability checks with alternative suggestions.   | [`PortArbiter`], [`PortCheck`]         |
//! | **Errors**        | Typed precondition/environment errors.                   | [`SupervisorError`], [`SnapshotError`] |
//! | **Configuration** | Centralized runtime settings and the launch contract.    | [`Config`], [`LaunchConfig`]           |
//!
//! ## Example
//! ```no_run
//! use emuvisor::{Config, Orchestrator, StartOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new(Config::default(), "./my-project");
//!     orchestrator.init().await?;
//!
//!     // Observers attached before start see every event of the session.
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(ev) = events.recv().await {
//!             println!("[{}] {}", ev.stream.as_str(), ev.text);
//!         }
//!     });
//!
//!     orchestrator
//!         .start(StartOptions {
//!             auto_snapshot: true,
//!             ..StartOptions::default()
//!         })
//!         .await?;
//!
//!     // … dashboard traffic …
//!
//!     orchestrator.stop().await?; // closing snapshot + prune + terminate
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod ports;
mod project;
mod snapshots;
mod subscribers;

// ---- Public re-exports ----

pub use config::{Config, LaunchConfig};
pub use crate::core::{
    LaunchSpec, LifecycleState, Orchestrator, ProcessHandle, ProcessSupervisor, StartOptions,
    Status,
};
pub use error::{PortConflict, SnapshotError, SupervisorError};
pub use events::{LogBus, LogEvent, StreamTag};
pub use ports::{PortArbiter, PortCheck};
pub use project::{ProjectConfig, ProjectLayout, ServiceConfig};
pub use snapshots::{
    CommandExporter, Exporter, RetentionPolicy, SnapshotOrigin, SnapshotScheduler, SnapshotStore,
};
pub use subscribers::LogWriter;
