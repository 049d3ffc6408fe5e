//! # Per-project on-disk layout.
//!
//! A project directory holds everything one emulator suite persists:
//!
//! ```text
//! <root>/
//!   emulators.json      services config: name → { port, host }
//!   *.rules, …          rule-text files (opaque to this crate)
//!   snapshots/
//!     auto-<timestamp>/
//!     snapshot-<timestamp>/
//!     <user-chosen-name>/
//! ```
//!
//! The services config is the only file this crate reads: it supplies the
//! set of ports the pre-flight probes. Rule files belong to the excluded
//! CRUD layer and are never touched here.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::SupervisorError;

/// Name of the services config file inside a project directory.
pub const CONFIG_FILE: &str = "emulators.json";

/// Name of the snapshots subdirectory inside a project directory.
pub const SNAPSHOTS_DIR: &str = "snapshots";

/// One emulated service's listen address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// The services a launch should request, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub services: BTreeMap<String, ServiceConfig>,
}

impl ProjectConfig {
    /// The set of ports the pre-flight must probe.
    pub fn ports(&self) -> BTreeSet<u16> {
        self.services.values().map(|s| s.port).collect()
    }
}

impl Default for ProjectConfig {
    /// The reference suite: auth, firestore, database, hosting, storage,
    /// and the tool's own UI, on their conventional ports.
    fn default() -> Self {
        let services = [
            ("auth", 9099),
            ("firestore", 8080),
            ("database", 9000),
            ("hosting", 5000),
            ("storage", 9199),
            ("ui", 4000),
        ]
        .into_iter()
        .map(|(name, port)| {
            (
                name.to_string(),
                ServiceConfig {
                    port,
                    host: default_host(),
                },
            )
        })
        .collect();
        Self { services }
    }
}

/// Paths of one project directory.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR)
    }

    /// Creates the project directory, the snapshots subdirectory, and a
    /// default services config when none exists yet. Idempotent; an
    /// existing config is never overwritten.
    pub async fn init(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await?;
        fs::create_dir_all(self.snapshots_dir()).await?;

        let config_path = self.config_path();
        if !fs::try_exists(&config_path).await? {
            let default = serde_json::to_vec_pretty(&ProjectConfig::default())
                .map_err(io::Error::other)?;
            fs::write(&config_path, default).await?;
        }
        Ok(())
    }

    /// Loads the services config; an absent file yields the defaults so a
    /// start works on a bare directory.
    pub async fn load_config(&self) -> Result<ProjectConfig, SupervisorError> {
        let raw = match fs::read(self.config_path()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(ProjectConfig::default());
            }
            Err(source) => return Err(SupervisorError::Project { source }),
        };
        serde_json::from_slice(&raw).map_err(|source| SupervisorError::Config { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_covers_reference_suite() {
        let cfg = ProjectConfig::default();
        assert_eq!(cfg.services.len(), 6);
        assert_eq!(cfg.services["firestore"].port, 8080);
        assert_eq!(cfg.services["ui"].port, 4000);
        assert_eq!(cfg.ports().len(), 6);
    }

    #[tokio::test]
    async fn test_init_is_idempotent_and_preserves_config() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path().join("proj"));

        layout.init().await.unwrap();
        assert!(layout.snapshots_dir().is_dir());

        // Edit the config, re-init, and make sure it survived.
        let custom = ProjectConfig {
            services: [(
                "only".to_string(),
                ServiceConfig {
                    port: 4242,
                    host: default_host(),
                },
            )]
            .into_iter()
            .collect(),
        };
        fs::write(
            layout.config_path(),
            serde_json::to_vec_pretty(&custom).unwrap(),
        )
        .await
        .unwrap();

        layout.init().await.unwrap();
        let loaded = layout.load_config().await.unwrap();
        assert_eq!(loaded, custom);
    }

    #[tokio::test]
    async fn test_load_config_defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let loaded = layout.load_config().await.unwrap();
        assert_eq!(loaded, ProjectConfig::default());
    }

    #[tokio::test]
    async fn test_load_config_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        fs::write(layout.config_path(), b"{ not json").await.unwrap();

        let err = layout.load_config().await.unwrap_err();
        assert!(matches!(err, SupervisorError::Config { .. }));
    }
}
