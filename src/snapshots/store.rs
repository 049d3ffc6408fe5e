//! # Snapshot store: named point-in-time exports of the process's state.
//!
//! [`SnapshotStore`] creates, lists, deletes, and retention-prunes the
//! immediate children of a project's `snapshots/` directory. The actual
//! export is delegated to an [`Exporter`]; the production implementation,
//! [`CommandExporter`], runs the external tool's export command against the
//! destination directory and waits for it to finish.
//!
//! ## Rules
//! - Snapshots are immutable once created; deletion is the only mutation.
//! - A name collision is an overwrite (last writer wins), never an error.
//! - Deletion is idempotent: deleting a snapshot that does not exist is Ok.
//! - Completed exports and every deletion are reported as `Lifecycle`
//!   events so the dashboard sees progress without polling.
//! - The store holds no per-project state: every operation takes the
//!   snapshots directory it acts on.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;

use crate::error::SnapshotError;
use crate::events::LogBus;
use crate::snapshots::policy::{RetentionPolicy, SnapshotOrigin};

/// Runs one export of persisted state into a destination directory.
///
/// The seam exists so the scheduler and store can be exercised without the
/// external tool; tests substitute a filesystem fake.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Exports the current state into `dest`, creating it if needed.
    /// `dest` may already exist from a same-second collision; the export
    /// overwrites it.
    async fn export(&self, dest: &Path) -> Result<(), SnapshotError>;
}

/// Exports by spawning the external tool: `<program> <args…> <dest>` with a
/// fixed working directory (the project directory).
///
/// Output of the export command itself is discarded; the tool reports its
/// progress through the supervised process's own log stream.
pub struct CommandExporter {
    program: String,
    args: Vec<String>,
    work_dir: PathBuf,
}

impl CommandExporter {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            work_dir: work_dir.into(),
        }
    }
}

#[async_trait]
impl Exporter for CommandExporter {
    async fn export(&self, dest: &Path) -> Result<(), SnapshotError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(dest)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| SnapshotError::ExporterSpawn { source })?;

        if status.success() {
            Ok(())
        } else {
            Err(SnapshotError::ExportFailed {
                code: status.code(),
            })
        }
    }
}

/// Creates, lists, deletes, and prunes snapshots under a data root.
pub struct SnapshotStore {
    exporter: Arc<dyn Exporter>,
    bus: LogBus,
}

impl SnapshotStore {
    pub fn new(exporter: Arc<dyn Exporter>, bus: LogBus) -> Self {
        Self { exporter, bus }
    }

    /// Exports a snapshot into `snapshots_dir`.
    ///
    /// `name` defaults to `<prefix>-<timestamp>` for the given origin
    /// (`snapshot-…` for manual calls, `auto-…` for scheduled ones).
    /// Returns the snapshot's name.
    pub async fn export(
        &self,
        snapshots_dir: &Path,
        origin: SnapshotOrigin,
        name: Option<&str>,
    ) -> Result<String, SnapshotError> {
        let name = match name {
            Some(n) => validate_name(n)?.to_string(),
            None => origin.generated_name(),
        };

        fs::create_dir_all(snapshots_dir).await?;
        self.exporter.export(&snapshots_dir.join(&name)).await?;

        self.bus.lifecycle(format!("snapshot exported: {name}"));
        Ok(name)
    }

    /// Lists snapshot names in lexicographic order, which the naming scheme
    /// makes equal to creation order.
    pub async fn list(&self, snapshots_dir: &Path) -> Result<Vec<String>, SnapshotError> {
        let mut names = Vec::new();
        let mut entries = match fs::read_dir(snapshots_dir).await {
            Ok(entries) => entries,
            // An absent directory is an empty store, not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Ok(name) = entry.file_name().into_string() {
                    names.push(name);
                }
            }
        }
        names.sort_unstable();
        Ok(names)
    }

    /// Deletes one snapshot. Idempotent: a missing snapshot is Ok and does
    /// not produce a deletion event.
    pub async fn delete(&self, snapshots_dir: &Path, name: &str) -> Result<(), SnapshotError> {
        let name = validate_name(name)?;
        match fs::remove_dir_all(snapshots_dir.join(name)).await {
            Ok(()) => {
                self.bus.lifecycle(format!("snapshot deleted: {name}"));
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Applies the retention policy: deletes every auto-tagged snapshot past
    /// the `policy.keep` most recent ones. Manual snapshots are never
    /// touched. Returns the deleted names.
    pub async fn prune(
        &self,
        snapshots_dir: &Path,
        policy: &RetentionPolicy,
    ) -> Result<Vec<String>, SnapshotError> {
        let names = self.list(snapshots_dir).await?;
        let doomed = policy.overflow(names.iter().map(String::as_str));

        for name in &doomed {
            self.delete(snapshots_dir, name).await?;
        }
        Ok(doomed)
    }
}

/// Snapshot names address immediate children of the snapshots directory;
/// anything that could escape it is rejected up front.
fn validate_name(name: &str) -> Result<&str, SnapshotError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if bad {
        return Err(SnapshotError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(name)
}
