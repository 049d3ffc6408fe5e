//! Error types used by the supervision core.
//!
//! This module defines two error enums:
//!
//! - [`SupervisorError`] — synchronous failures of lifecycle operations
//!   (start/stop) and of the facade API built on top of them.
//! - [`SnapshotError`] — failures of snapshot export, listing, deletion,
//!   and pruning.
//!
//! Both follow the same taxonomy: *precondition* errors (start while
//! running, stop while idle, a malformed snapshot name) are reported to the
//! caller and never retried; *environment* errors (spawn failure, occupied
//! ports, export-tool failure) leave the supervisor in a clean, retry-able
//! state. Asynchronous failures — a scheduled export failing mid-session —
//! never surface here at all; they are published on the
//! [`LogBus`](crate::LogBus) and swallowed. An unexpected child exit is a
//! state transition, not an error.

use std::io;

use thiserror::Error;

use crate::core::LifecycleState;

/// A port that failed pre-flight, with the nearest free alternative if one
/// was found in the search window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConflict {
    /// The requested port.
    pub port: u16,
    /// First free port in `port+1..=port+window`, if any.
    pub suggested: Option<u16>,
}

/// # Errors produced by lifecycle operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// Start was called while a session is already active.
    #[error("already running (state: {state:?})")]
    AlreadyRunning {
        /// State observed at the time of the call.
        state: LifecycleState,
    },

    /// Stop was called with no active session.
    #[error("not running (state: {state:?})")]
    NotRunning {
        /// State observed at the time of the call.
        state: LifecycleState,
    },

    /// One or more requested ports are occupied; nothing was spawned.
    #[error("ports unavailable: {conflicts:?}")]
    PortsUnavailable {
        /// Each conflicting port with its suggested alternative.
        conflicts: Vec<PortConflict>,
    },

    /// Spawning the child process failed.
    #[error("failed to spawn supervised process: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },

    /// Reading or writing the project layout failed.
    #[error("project layout error: {source}")]
    Project {
        #[source]
        source: io::Error,
    },

    /// The project services config could not be parsed.
    #[error("invalid services config: {source}")]
    Config {
        #[source]
        source: serde_json::Error,
    },

    /// A snapshot operation invoked synchronously through the facade failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use emuvisor::{LifecycleState, SupervisorError};
    ///
    /// let err = SupervisorError::NotRunning { state: LifecycleState::Idle };
    /// assert_eq!(err.as_label(), "not_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::AlreadyRunning { .. } => "already_running",
            SupervisorError::NotRunning { .. } => "not_running",
            SupervisorError::PortsUnavailable { .. } => "ports_unavailable",
            SupervisorError::Spawn { .. } => "spawn_failed",
            SupervisorError::Project { .. } => "project_io",
            SupervisorError::Config { .. } => "config_invalid",
            SupervisorError::Snapshot(e) => e.as_label(),
        }
    }

    /// Indicates a precondition violation (caller error) as opposed to an
    /// environment failure.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SupervisorError::AlreadyRunning { .. }
                | SupervisorError::NotRunning { .. }
                | SupervisorError::Snapshot(SnapshotError::InvalidName { .. })
        )
    }
}

/// # Errors produced by snapshot operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Snapshot names are single path components; separators and dot
    /// components are rejected before touching the filesystem.
    #[error("invalid snapshot name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// The export tool could not be spawned.
    #[error("failed to spawn export command: {source}")]
    ExporterSpawn {
        #[source]
        source: io::Error,
    },

    /// The export tool ran but exited unsuccessfully.
    #[error("export command failed (exit code: {code:?})")]
    ExportFailed {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
    },

    /// Filesystem access under the snapshots directory failed.
    #[error("snapshot io error: {source}")]
    Io {
        #[source]
        source: io::Error,
    },
}

impl SnapshotError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SnapshotError::InvalidName { .. } => "snapshot_invalid_name",
            SnapshotError::ExporterSpawn { .. } => "snapshot_exporter_spawn",
            SnapshotError::ExportFailed { .. } => "snapshot_export_failed",
            SnapshotError::Io { .. } => "snapshot_io",
        }
    }
}

impl From<io::Error> for SnapshotError {
    fn from(source: io::Error) -> Self {
        SnapshotError::Io { source }
    }
}
