//! # Orchestrator: the single entry point collaborators call.
//!
//! Composes the bus, port arbiter, snapshot store, supervisor, and project
//! layout behind one facade. The HTTP/RPC layer (out of scope) maps its
//! requests onto these methods one-to-one; the real-time transport layer
//! attaches to [`Orchestrator::subscribe`] and relays events unmodified.
//!
//! ## Rules
//! - Port pre-flight runs before anything is spawned; a conflict is a
//!   synchronous error naming every busy port and its suggested
//!   alternative.
//! - Launch contract with the external tool: working directory = project
//!   directory; `--import <path>` is appended only when an import path is
//!   requested **and** exists on disk; the debug flag is appended verbatim.
//! - The facade owns no lifecycle state of its own — the supervisor's
//!   state machine is the single synchronization point.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::core::state::Status;
use crate::core::supervisor::{LaunchSpec, ProcessSupervisor};
use crate::error::{PortConflict, SupervisorError};
use crate::events::{LogBus, LogEvent};
use crate::ports::{PortArbiter, PortCheck};
use crate::project::ProjectLayout;
use crate::snapshots::{CommandExporter, Exporter, SnapshotOrigin, SnapshotStore};

/// Per-session options carried by a start request.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Previously exported state to import on launch. Ignored when the
    /// path does not exist, matching the reference dashboard's behavior.
    pub import: Option<PathBuf>,
    /// Append the tool's debug flag.
    pub debug: bool,
    /// Run the periodic snapshot timer for this session.
    pub auto_snapshot: bool,
}

/// Facade over the supervision core for one project.
pub struct Orchestrator {
    cfg: Config,
    bus: LogBus,
    arbiter: PortArbiter,
    store: Arc<SnapshotStore>,
    supervisor: ProcessSupervisor,
    layout: ProjectLayout,
}

impl Orchestrator {
    /// Builds the facade with the production exporter (the external tool's
    /// export command, run in the project directory).
    pub fn new(cfg: Config, project_root: impl Into<PathBuf>) -> Self {
        let layout = ProjectLayout::new(project_root);
        let exporter = Arc::new(CommandExporter::new(
            cfg.launch.program.as_str(),
            cfg.launch.export_args.clone(),
            layout.root(),
        ));
        Self::with_exporter(cfg, layout, exporter)
    }

    /// Builds the facade with a custom [`Exporter`]; the seam tests use.
    pub fn with_exporter(
        cfg: Config,
        layout: ProjectLayout,
        exporter: Arc<dyn Exporter>,
    ) -> Self {
        let bus = LogBus::new(cfg.bus_capacity);
        let store = Arc::new(SnapshotStore::new(exporter, bus.clone()));
        let supervisor = ProcessSupervisor::new(cfg.clone(), bus.clone(), Arc::clone(&store));
        let arbiter = PortArbiter::new(cfg.port_search_window);
        Self {
            cfg,
            bus,
            arbiter,
            store,
            supervisor,
            layout,
        }
    }

    /// The push channel: a live sequence of [`LogEvent`]s starting at
    /// subscription time. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.bus.subscribe()
    }

    /// The underlying bus, for observers that attach themselves (such as
    /// [`LogWriter`](crate::LogWriter)).
    pub fn bus(&self) -> &LogBus {
        &self.bus
    }

    /// Scaffolds the project on disk: the project directory, the snapshots
    /// subdirectory, and a default services config when absent.
    pub async fn init(&self) -> Result<(), SupervisorError> {
        self.layout
            .init()
            .await
            .map_err(|source| SupervisorError::Project { source })
    }

    /// Pre-flights the project's service ports, then starts a session.
    pub async fn start(&self, opts: StartOptions) -> Result<(), SupervisorError> {
        let config = self.layout.load_config().await?;

        let results = self.arbiter.check(&config.ports()).await;
        let conflicts: Vec<PortConflict> = results
            .iter()
            .filter(|(_, check)| !check.available)
            .map(|(&port, check)| PortConflict {
                port,
                suggested: check.suggested,
            })
            .collect();
        if !conflicts.is_empty() {
            return Err(SupervisorError::PortsUnavailable { conflicts });
        }

        let mut args = self.cfg.launch.start_args.clone();
        if let Some(import) = &opts.import {
            if tokio::fs::try_exists(import).await.unwrap_or(false) {
                args.push("--import".to_string());
                args.push(import.display().to_string());
            }
        }
        if opts.debug {
            args.push(self.cfg.launch.debug_flag.clone());
        }

        self.supervisor
            .start(LaunchSpec {
                program: self.cfg.launch.program.clone(),
                args,
                work_dir: self.layout.root().to_path_buf(),
                envs: Vec::new(),
                snapshots_dir: self.layout.snapshots_dir(),
                auto_snapshot: opts.auto_snapshot,
            })
            .await
    }

    /// Stops the running session (closing snapshot included).
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        self.supervisor.stop().await
    }

    /// Current lifecycle status; pure read.
    pub async fn status(&self) -> Status {
        self.supervisor.status().await
    }

    /// Probes arbitrary ports on behalf of the dashboard.
    pub async fn check_ports(&self, ports: &BTreeSet<u16>) -> BTreeMap<u16, PortCheck> {
        self.arbiter.check(ports).await
    }

    /// Takes a manual snapshot; `name` defaults to `snapshot-<timestamp>`.
    pub async fn export(&self, name: Option<&str>) -> Result<String, SupervisorError> {
        Ok(self
            .store
            .export(&self.layout.snapshots_dir(), SnapshotOrigin::Manual, name)
            .await?)
    }

    /// Lists snapshots in creation order.
    pub async fn list_snapshots(&self) -> Result<Vec<String>, SupervisorError> {
        Ok(self.store.list(&self.layout.snapshots_dir()).await?)
    }

    /// Deletes one snapshot; idempotent.
    pub async fn delete_snapshot(&self, name: &str) -> Result<(), SupervisorError> {
        Ok(self
            .store
            .delete(&self.layout.snapshots_dir(), name)
            .await?)
    }

    /// Runs one retention pass; returns the deleted names.
    pub async fn prune(&self) -> Result<Vec<String>, SupervisorError> {
        Ok(self
            .store
            .prune(&self.layout.snapshots_dir(), &self.cfg.retention)
            .await?)
    }
}
