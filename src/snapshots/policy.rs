//! # Snapshot origin tags and retention policy.
//!
//! [`SnapshotOrigin`] distinguishes manually-triggered exports from
//! scheduler-triggered ones. The distinction is encoded on disk purely by
//! name prefix (`snapshot-` vs `auto-`) and is used only for retention
//! decisions: manual snapshots are never auto-pruned.
//!
//! [`RetentionPolicy`] is a pure parameter — keep the N most recent
//! auto-tagged snapshots; the naming scheme makes lexicographic order equal
//! creation order, so "most recent" is a sort, not a stat call.

use chrono::Utc;

/// Name prefix that marks a snapshot as a pruning candidate.
pub(crate) const AUTO_PREFIX: &str = "auto-";

/// What triggered a snapshot export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Explicit user action through the facade.
    Manual,
    /// The periodic timer while the process is running.
    AutoPeriodic,
    /// The closing snapshot taken during an orderly stop.
    AutoOnStop,
}

impl SnapshotOrigin {
    /// On-disk name prefix for generated snapshot names.
    ///
    /// Both scheduler origins share the `auto` prefix: retention does not
    /// distinguish a periodic snapshot from a closing one.
    pub fn prefix(&self) -> &'static str {
        match self {
            SnapshotOrigin::Manual => "snapshot",
            SnapshotOrigin::AutoPeriodic | SnapshotOrigin::AutoOnStop => "auto",
        }
    }

    /// Whether snapshots of this origin are candidates for retention pruning.
    pub fn is_auto_pruned(&self) -> bool {
        !matches!(self, SnapshotOrigin::Manual)
    }

    /// Generates a directory-safe name: `<prefix>-<UTC timestamp>`, second
    /// resolution, no colons. Two exports of the same origin within one
    /// second collide by overwrite (last writer wins).
    pub fn generated_name(&self) -> String {
        format!("{}-{}", self.prefix(), Utc::now().format("%Y%m%dT%H%M%S"))
    }
}

/// Keep the N most recently created auto-tagged snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// How many auto snapshots survive a prune pass.
    pub keep: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { keep: 5 }
    }
}

impl RetentionPolicy {
    pub fn new(keep: usize) -> Self {
        Self { keep }
    }

    /// Selects the snapshots a prune pass should delete.
    ///
    /// Candidates are the auto-prefixed names only; they are ordered
    /// descending (newest first, given the timestamp naming scheme) and
    /// everything past the first `keep` is returned for deletion. Manual
    /// snapshots are excluded from the candidate set entirely, regardless
    /// of how many exist.
    pub fn overflow<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut auto: Vec<&str> = names
            .into_iter()
            .filter(|n| n.starts_with(AUTO_PREFIX))
            .collect();
        auto.sort_unstable_by(|a, b| b.cmp(a));
        auto.into_iter()
            .skip(self.keep)
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_prefixes() {
        assert_eq!(SnapshotOrigin::Manual.prefix(), "snapshot");
        assert_eq!(SnapshotOrigin::AutoPeriodic.prefix(), "auto");
        assert_eq!(SnapshotOrigin::AutoOnStop.prefix(), "auto");
        assert!(!SnapshotOrigin::Manual.is_auto_pruned());
        assert!(SnapshotOrigin::AutoPeriodic.is_auto_pruned());
        assert!(SnapshotOrigin::AutoOnStop.is_auto_pruned());
    }

    #[test]
    fn test_generated_names_are_directory_safe() {
        let name = SnapshotOrigin::AutoPeriodic.generated_name();
        assert!(name.starts_with("auto-"));
        assert!(!name.contains(':'));
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_overflow_keeps_newest_auto_and_all_manual() {
        let names = [
            "auto-20260101T000001",
            "auto-20260101T000002",
            "auto-20260101T000003",
            "auto-20260101T000004",
            "auto-20260101T000005",
            "auto-20260101T000006",
            "auto-20260101T000007",
            "auto-20260101T000008",
            "snapshot-20260101T000001",
            "snapshot-20260101T000009",
            "my-baseline",
        ];

        let policy = RetentionPolicy::new(5);
        let doomed = policy.overflow(names.iter().copied());

        // The three oldest auto snapshots, nothing else.
        assert_eq!(
            doomed,
            vec![
                "auto-20260101T000003".to_string(),
                "auto-20260101T000002".to_string(),
                "auto-20260101T000001".to_string(),
            ]
        );
    }

    #[test]
    fn test_overflow_under_limit_deletes_nothing() {
        let names = ["auto-20260101T000001", "auto-20260101T000002"];
        assert!(RetentionPolicy::new(5).overflow(names).is_empty());
    }

    #[test]
    fn test_overflow_keep_zero_deletes_all_auto() {
        let names = ["auto-20260101T000001", "snapshot-20260101T000002"];
        let doomed = RetentionPolicy::new(0).overflow(names);
        assert_eq!(doomed, vec!["auto-20260101T000001".to_string()]);
    }
}
