//! # Snapshot scheduler: periodic exports while the process runs.
//!
//! [`SnapshotScheduler`] owns the auto-snapshot cadence of one session.
//! While the supervised process is running it exports on a fixed interval
//! and prunes after every export; on an orderly stop it takes one closing
//! snapshot before the process is signalled.
//!
//! ## Event flow
//! ```text
//! tick ──► Export(auto-periodic) ──► Prune
//!   │            │
//!   │            └─ Err ──► publish Lifecycle("scheduled snapshot failed…")
//!   │                       (swallowed; the loop keeps ticking)
//!   └─ cancellation requested ──► loop exits, no further tick begins
//!
//! stop ──► Export(auto-on-stop) ──► Prune      (once, best-effort)
//! ```
//!
//! ## Rules
//! - The first tick fires one full period after start, not immediately.
//! - Cancellation is checked with priority over the timer: once requested,
//!   no new tick begins. A tick already executing finishes.
//! - A failing tick never kills the loop and never propagates anywhere;
//!   it is only observable on the bus.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::events::LogBus;
use crate::snapshots::policy::{RetentionPolicy, SnapshotOrigin};
use crate::snapshots::store::SnapshotStore;

/// Periodic auto-snapshot driver for one session.
pub struct SnapshotScheduler {
    store: Arc<SnapshotStore>,
    bus: LogBus,
    snapshots_dir: PathBuf,
    period: Duration,
    retention: RetentionPolicy,
}

impl SnapshotScheduler {
    pub fn new(
        store: Arc<SnapshotStore>,
        bus: LogBus,
        snapshots_dir: PathBuf,
        period: Duration,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            store,
            bus,
            snapshots_dir,
            period,
            retention,
        }
    }

    /// Runs the periodic timer until `token` is cancelled.
    ///
    /// Spawned by the supervisor when a session starts with auto-snapshots
    /// enabled; the supervisor cancels the token atomically with leaving
    /// the Running state.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        let mut ticks = time::interval_at(time::Instant::now() + self.period, self.period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticks.tick() => self.snapshot(SnapshotOrigin::AutoPeriodic).await,
            }
        }
    }

    /// Takes the closing snapshot of an orderly stop.
    ///
    /// Runs after the periodic timer is cancelled and before the process is
    /// signalled (the export tool talks to the still-running process).
    /// Best-effort: failure is reported on the bus and must not block
    /// shutdown.
    pub async fn closing_snapshot(&self) {
        self.snapshot(SnapshotOrigin::AutoOnStop).await;
    }

    /// One export-then-prune pass. Failures are published and swallowed.
    async fn snapshot(&self, origin: SnapshotOrigin) {
        match self.store.export(&self.snapshots_dir, origin, None).await {
            Ok(_) => {
                if let Err(e) = self.store.prune(&self.snapshots_dir, &self.retention).await {
                    self.bus
                        .lifecycle(format!("snapshot prune failed: {e} ({})", e.as_label()));
                }
            }
            Err(e) => {
                self.bus
                    .lifecycle(format!("scheduled snapshot failed: {e} ({})", e.as_label()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::SnapshotError;
    use crate::snapshots::store::Exporter;

    /// Counts export attempts; fails every attempt when `fail` is set.
    struct CountingExporter {
        count: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Exporter for CountingExporter {
        async fn export(&self, dest: &Path) -> Result<(), SnapshotError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SnapshotError::ExportFailed { code: Some(1) });
            }
            tokio::fs::create_dir_all(dest).await?;
            Ok(())
        }
    }

    fn scheduler(
        dir: &Path,
        period: Duration,
        fail: bool,
    ) -> (Arc<SnapshotScheduler>, Arc<CountingExporter>, LogBus) {
        let bus = LogBus::new(64);
        let exporter = Arc::new(CountingExporter {
            count: AtomicUsize::new(0),
            fail,
        });
        let store = Arc::new(SnapshotStore::new(exporter.clone(), bus.clone()));
        let sched = Arc::new(SnapshotScheduler::new(
            store,
            bus.clone(),
            dir.to_path_buf(),
            period,
            RetentionPolicy::default(),
        ));
        (sched, exporter, bus)
    }

    #[tokio::test]
    async fn test_ticks_export_periodically_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let (sched, exporter, _bus) = scheduler(dir.path(), Duration::from_millis(20), false);

        let token = CancellationToken::new();
        let handle = tokio::spawn(sched.run(token.clone()));

        tokio::time::sleep(Duration::from_millis(110)).await;
        token.cancel();
        handle.await.unwrap();

        let ticked = exporter.count.load(Ordering::SeqCst);
        assert!(ticked >= 2, "expected several ticks, saw {ticked}");

        // No tick may begin after cancellation.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(exporter.count.load(Ordering::SeqCst), ticked);
    }

    #[tokio::test]
    async fn test_failing_tick_does_not_kill_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (sched, exporter, bus) = scheduler(dir.path(), Duration::from_millis(20), true);
        let mut rx = bus.subscribe();

        let token = CancellationToken::new();
        let handle = tokio::spawn(sched.run(token.clone()));

        tokio::time::sleep(Duration::from_millis(110)).await;
        token.cancel();
        handle.await.unwrap();

        assert!(
            exporter.count.load(Ordering::SeqCst) >= 2,
            "loop should have kept ticking through failures"
        );
        let ev = rx.recv().await.unwrap();
        assert!(ev.text.contains("scheduled snapshot failed"));
    }

    #[tokio::test]
    async fn test_closing_snapshot_is_a_single_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let (sched, exporter, _bus) = scheduler(dir.path(), Duration::from_secs(3600), false);

        sched.closing_snapshot().await;
        assert_eq!(exporter.count.load(Ordering::SeqCst), 1);
    }
}
