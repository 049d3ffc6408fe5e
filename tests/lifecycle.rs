//! Lifecycle tests against real child processes.
//!
//! These drive `sh` children through the supervisor's state machine: the
//! double-spawn guard, crash detection with exit codes, the closing
//! snapshot of an orderly stop, and log streaming.

#![cfg(unix)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::timeout;

use emuvisor::{
    Config, Exporter, LaunchSpec, LifecycleState, LogBus, LogEvent, ProcessSupervisor,
    SnapshotError, SnapshotStore, StreamTag, SupervisorError,
};

/// Counts export attempts and materializes each snapshot as a directory.
struct CountingExporter {
    count: AtomicUsize,
}

#[async_trait]
impl Exporter for CountingExporter {
    async fn export(&self, dest: &Path) -> Result<(), SnapshotError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        tokio::fs::create_dir_all(dest).await?;
        Ok(())
    }
}

fn supervisor(grace: Duration) -> (ProcessSupervisor, LogBus, Arc<CountingExporter>) {
    let cfg = Config {
        grace,
        snapshot_interval: Duration::from_secs(3600),
        ..Config::default()
    };
    let bus = LogBus::new(256);
    let exporter = Arc::new(CountingExporter {
        count: AtomicUsize::new(0),
    });
    let store = Arc::new(SnapshotStore::new(exporter.clone(), bus.clone()));
    (
        ProcessSupervisor::new(cfg, bus.clone(), store),
        bus,
        exporter,
    )
}

fn sh(dir: &Path, script: &str, auto_snapshot: bool) -> LaunchSpec {
    LaunchSpec {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        work_dir: dir.to_path_buf(),
        envs: Vec::new(),
        snapshots_dir: dir.join("snapshots"),
        auto_snapshot,
    }
}

/// Drains the receiver until an event matches, or panics after 10s.
async fn expect_event<F>(rx: &mut broadcast::Receiver<LogEvent>, pred: F) -> LogEvent
where
    F: Fn(&LogEvent) -> bool,
{
    timeout(Duration::from_secs(10), async {
        loop {
            let ev = rx.recv().await.expect("bus closed before expected event");
            if pred(&ev) {
                return ev;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn test_graceful_stop_walks_back_to_idle() {
    let dir = tempfile::tempdir().unwrap();
    let (sup, bus, _exporter) = supervisor(Duration::from_secs(5));
    let mut rx = bus.subscribe();

    sup.start(sh(dir.path(), "sleep 30", false)).await.unwrap();
    let status = sup.status().await;
    assert!(status.running);
    assert_eq!(status.state, LifecycleState::Running);
    assert!(status.pid.is_some());

    sup.stop().await.unwrap();
    let status = sup.status().await;
    assert!(!status.running);
    assert_eq!(status.state, LifecycleState::Idle);
    assert_eq!(status.pid, None);

    expect_event(&mut rx, |ev| ev.text.contains("stopping supervised process")).await;
    expect_event(&mut rx, |ev| {
        ev.is_lifecycle()
            && (ev.text.contains("exited with code") || ev.text.contains("terminated"))
    })
    .await;
}

#[tokio::test]
async fn test_second_start_fails_and_preserves_handle() {
    let dir = tempfile::tempdir().unwrap();
    let (sup, _bus, _exporter) = supervisor(Duration::from_secs(5));

    sup.start(sh(dir.path(), "sleep 30", false)).await.unwrap();
    let pid = sup.status().await.pid;
    assert!(pid.is_some());

    let err = sup
        .start(sh(dir.path(), "sleep 30", false))
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning { .. }));
    assert_eq!(err.as_label(), "already_running");
    assert!(err.is_precondition());

    // The running session is untouched.
    let status = sup.status().await;
    assert!(status.running);
    assert_eq!(status.pid, pid);

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_while_idle_is_a_precondition_error() {
    let (sup, _bus, _exporter) = supervisor(Duration::from_secs(5));
    let err = sup.stop().await.unwrap_err();
    assert!(matches!(
        err,
        SupervisorError::NotRunning {
            state: LifecycleState::Idle
        }
    ));
}

#[tokio::test]
async fn test_crash_publishes_exit_code_and_allows_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (sup, bus, _exporter) = supervisor(Duration::from_secs(5));
    let mut rx = bus.subscribe(); // attached before the crash

    sup.start(sh(dir.path(), "exit 1", false)).await.unwrap();

    let mut state = sup.watch_state();
    timeout(
        Duration::from_secs(10),
        state.wait_for(|s| *s == LifecycleState::CrashExited),
    )
    .await
    .expect("child exit was not observed")
    .unwrap();

    let status = sup.status().await;
    assert!(!status.running);
    assert_eq!(status.state, LifecycleState::CrashExited);
    assert_eq!(status.pid, None);

    let ev = expect_event(&mut rx, |ev| ev.text.contains("exited unexpectedly")).await;
    assert!(ev.text.contains("code 1"), "event was: {}", ev.text);

    // A crash is terminal for the session only; the next start succeeds.
    sup.start(sh(dir.path(), "sleep 30", false)).await.unwrap();
    assert!(sup.status().await.running);
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_takes_exactly_one_closing_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let (sup, _bus, exporter) = supervisor(Duration::from_secs(5));

    // Interval is hours long: any export that happens belongs to the stop.
    sup.start(sh(dir.path(), "sleep 30", true)).await.unwrap();
    assert_eq!(exporter.count.load(Ordering::SeqCst), 0);

    sup.stop().await.unwrap();
    assert_eq!(exporter.count.load(Ordering::SeqCst), 1);

    let autos: Vec<_> = std::fs::read_dir(dir.path().join("snapshots"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().into_string().unwrap())
        .filter(|n| n.starts_with("auto-"))
        .collect();
    assert_eq!(autos.len(), 1);
}

#[tokio::test]
async fn test_spawn_failure_is_clean_and_retryable() {
    let dir = tempfile::tempdir().unwrap();
    let (sup, bus, _exporter) = supervisor(Duration::from_secs(5));
    let mut rx = bus.subscribe();

    let mut spec = sh(dir.path(), "sleep 30", false);
    spec.program = "/nonexistent/emuvisor-test-binary".to_string();

    let err = sup.start(spec).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Spawn { .. }));
    assert_eq!(sup.status().await.state, LifecycleState::CrashExited);
    expect_event(&mut rx, |ev| ev.text.contains("failed to spawn")).await;

    // The supervisor is immediately eligible for a new start.
    sup.start(sh(dir.path(), "sleep 30", false)).await.unwrap();
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_child_output_streams_as_tagged_lines() {
    let dir = tempfile::tempdir().unwrap();
    let (sup, bus, _exporter) = supervisor(Duration::from_secs(5));
    let mut rx = bus.subscribe();

    sup.start(sh(
        dir.path(),
        "echo out-line; echo err-line >&2; sleep 30",
        false,
    ))
    .await
    .unwrap();

    // The two pipes race each other; collect until both lines were seen.
    let mut out = None;
    let mut err = None;
    timeout(Duration::from_secs(10), async {
        while out.is_none() || err.is_none() {
            let ev = rx.recv().await.expect("bus closed");
            let text = ev.text.clone();
            match &*text {
                "out-line" => out = Some(ev),
                "err-line" => err = Some(ev),
                _ => {}
            }
        }
    })
    .await
    .expect("child output did not arrive");

    assert_eq!(out.unwrap().stream, StreamTag::Stdout);
    assert_eq!(err.unwrap().stream, StreamTag::Stderr);

    sup.stop().await.unwrap();
}
