//! # Global runtime configuration.
//!
//! Provides [`Config`], centralized settings for the supervision core, and
//! [`LaunchConfig`], the contract with the external emulator tool.
//!
//! The launch contract is deliberately minimal: any command that emits logs
//! on stdout/stderr and exits with a status code can be supervised. The
//! defaults target the Firebase CLI, the reference tool.

use std::time::Duration;

use crate::snapshots::RetentionPolicy;

/// How the external tool is invoked.
///
/// The supervised process is launched as `<program> <start_args…>` (plus
/// per-session flags, see [`StartOptions`](crate::StartOptions)) with the
/// project directory as its working directory. Snapshots are taken by
/// running `<program> <export_args…> <destination>` against the same
/// working directory while the process is up.
#[derive(Clone, Debug)]
pub struct LaunchConfig {
    /// Executable to run.
    pub program: String,
    /// Arguments that start the long-running process.
    pub start_args: Vec<String>,
    /// Arguments that export persisted state; the destination directory is
    /// appended as the final argument.
    pub export_args: Vec<String>,
    /// Flag appended verbatim when a session requests debug output.
    pub debug_flag: String,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            program: "firebase".to_string(),
            start_args: vec!["emulators:start".to_string()],
            export_args: vec!["emulators:export".to_string()],
            debug_flag: "--debug".to_string(),
        }
    }
}

/// Global configuration for the supervision core.
///
/// ## Field semantics
/// - `grace`: bounded wait between the graceful termination signal and the
///   forceful kill
/// - `snapshot_interval`: period of the auto-snapshot timer
/// - `retention`: how many auto snapshots survive pruning
/// - `bus_capacity`: log-bus ring buffer size (min 1; clamped by the bus)
/// - `port_search_window`: how far above a busy port the arbiter searches
///   for an alternative
/// - `launch`: the external tool contract
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for the child to exit after the graceful signal
    /// before escalating to a forceful kill.
    pub grace: Duration,

    /// Period of the automatic snapshot timer while the process is running.
    pub snapshot_interval: Duration,

    /// Retention applied after every scheduled export and on the facade's
    /// explicit prune operation.
    pub retention: RetentionPolicy,

    /// Capacity of the log-bus broadcast ring buffer.
    ///
    /// Subscribers that lag behind more than `bus_capacity` events observe
    /// `Lagged` and skip older items; publishers are never blocked.
    pub bus_capacity: usize,

    /// Span of the alternative-port search: a busy port `p` is answered
    /// with the first free port in `p+1..=p+window`, if any.
    pub port_search_window: u16,

    /// Contract with the external tool.
    pub launch: LaunchConfig,
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 30s` (emulator suites can take a while to flush state)
    /// - `snapshot_interval = 15min` (reference dashboard cadence)
    /// - `retention = keep 5` auto snapshots
    /// - `bus_capacity = 1024`
    /// - `port_search_window = 100`
    /// - `launch = Firebase CLI defaults`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            snapshot_interval: Duration::from_secs(15 * 60),
            retention: RetentionPolicy::default(),
            bus_capacity: 1024,
            port_search_window: 100,
            launch: LaunchConfig::default(),
        }
    }
}
