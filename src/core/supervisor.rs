//! # ProcessSupervisor: lifecycle of the single supervised child.
//!
//! Owns at most one external long-running process at a time: start,
//! graceful stop, crash detection, and exit cleanup. All output and every
//! lifecycle transition is published on the [`LogBus`].
//!
//! ## Architecture
//! ```text
//! start(spec)
//!   ├─► spawn child (piped stdout/stderr, own process group on Unix)
//!   ├─► stdout reader ──┐
//!   ├─► stderr reader ──┼──► LogBus ──► observers
//!   ├─► exit watcher ───┘      ▲
//!   └─► SnapshotScheduler ─────┘   (periodic timer, when enabled)
//!
//! stop()
//!   ├─► cancel scheduler timer
//!   ├─► closing snapshot (auto-on-stop, best-effort)
//!   ├─► cancel stop token ──► watcher: SIGTERM group → grace → SIGKILL
//!   └─► await watcher (bounded) ──► Idle
//!
//! watcher on unexpected exit: Running ──► CrashExited + exit-code event
//! ```
//!
//! ## Rules
//! - Only one start may be in flight; a second start while
//!   Starting/Running/Stopping fails fast and leaves the existing session
//!   untouched. This is the load-bearing invariant of the whole core.
//! - State transitions happen only under the supervisor's mutex; the
//!   current state is mirrored into a watch channel for lock-free reads.
//! - The watcher task owns the child; nothing else touches it after spawn.
//! - Log-stream reads block only until the pipe closes at process exit;
//!   EOF is the completion signal, no read timeout exists.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::select;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::state::{LifecycleState, ProcessHandle, Status};
use crate::error::SupervisorError;
use crate::events::{LogBus, LogEvent, StreamTag};
use crate::snapshots::{SnapshotScheduler, SnapshotStore};

/// Extra wait on top of `grace` for the forceful kill to be reaped before
/// the stop path gives up and abandons the child.
const KILL_CONFIRM_MARGIN: Duration = Duration::from_secs(5);

/// Everything one session needs to launch.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Executable to run.
    pub program: String,
    /// Full argument vector (start args plus per-session flags).
    pub args: Vec<String>,
    /// Working directory for the child (the project directory).
    pub work_dir: PathBuf,
    /// Extra environment variables for the child.
    pub envs: Vec<(String, String)>,
    /// Where this session's snapshots live.
    pub snapshots_dir: PathBuf,
    /// Whether the periodic snapshot timer runs for this session.
    pub auto_snapshot: bool,
}

/// Per-session resources guarded by the supervisor mutex.
#[derive(Default)]
struct Inner {
    handle: Option<ProcessHandle>,
    /// Cancelling this asks the watcher to terminate the child.
    stop: Option<CancellationToken>,
    /// Cancelling this tears down the periodic snapshot timer.
    scheduler_token: Option<CancellationToken>,
    /// Kept for the closing snapshot on stop.
    scheduler: Option<Arc<SnapshotScheduler>>,
    watcher: Option<JoinHandle<()>>,
}

/// Supervises the lifecycle of at most one external process.
pub struct ProcessSupervisor {
    cfg: Config,
    bus: LogBus,
    store: Arc<SnapshotStore>,
    inner: Arc<Mutex<Inner>>,
    state: Arc<watch::Sender<LifecycleState>>,
}

impl ProcessSupervisor {
    pub fn new(cfg: Config, bus: LogBus, store: Arc<SnapshotStore>) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            cfg,
            bus,
            store,
            inner: Arc::new(Mutex::new(Inner::default())),
            state: Arc::new(state),
        }
    }

    /// Starts a new session.
    ///
    /// Fails fast with [`SupervisorError::AlreadyRunning`] unless the state
    /// admits a start. On success the state is `Running`, both output
    /// streams are being decoded into line events, the exit watcher owns
    /// the child, and the snapshot timer runs when the spec enables it.
    /// Spawn failure transitions to `CrashExited` and is returned
    /// synchronously; nothing is left behind.
    pub async fn start(&self, spec: LaunchSpec) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock().await;

        let current = *self.state.borrow();
        if !current.can_start() {
            return Err(SupervisorError::AlreadyRunning { state: current });
        }

        self.state.send_replace(LifecycleState::Starting);
        self.bus.lifecycle(format!(
            "starting {} in {}",
            spec.program,
            spec.work_dir.display()
        ));

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd.envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        #[cfg(unix)]
        cmd.process_group(0); // child leads its own group so we can signal the tree

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.state.send_replace(LifecycleState::CrashExited);
                self.bus
                    .lifecycle(format!("failed to spawn {}: {source}", spec.program));
                return Err(SupervisorError::Spawn { source });
            }
        };
        let pid = child.id();

        if let Some(out) = child.stdout.take() {
            spawn_line_reader(self.bus.clone(), StreamTag::Stdout, out);
        }
        if let Some(err) = child.stderr.take() {
            spawn_line_reader(self.bus.clone(), StreamTag::Stderr, err);
        }

        // The closing snapshot of an orderly stop needs the scheduler, so it
        // is always constructed; its timer only runs when enabled.
        let scheduler = Arc::new(SnapshotScheduler::new(
            Arc::clone(&self.store),
            self.bus.clone(),
            spec.snapshots_dir.clone(),
            self.cfg.snapshot_interval,
            self.cfg.retention,
        ));
        let scheduler_token = CancellationToken::new();
        if spec.auto_snapshot {
            tokio::spawn(Arc::clone(&scheduler).run(scheduler_token.clone()));
        }

        let stop = CancellationToken::new();
        let watcher = tokio::spawn(watch_child(
            child,
            stop.clone(),
            Arc::clone(&self.inner),
            Arc::clone(&self.state),
            self.bus.clone(),
            self.cfg.grace,
        ));

        inner.handle = Some(ProcessHandle {
            pid,
            work_dir: spec.work_dir,
            args: spec.args,
            started_at: SystemTime::now(),
        });
        inner.stop = Some(stop);
        inner.scheduler_token = Some(scheduler_token);
        inner.scheduler = Some(scheduler);
        inner.watcher = Some(watcher);

        self.state.send_replace(LifecycleState::Running);
        self.bus.lifecycle(match pid {
            Some(p) => format!("supervised process running (pid {p})"),
            None => "supervised process running".to_string(),
        });
        Ok(())
    }

    /// Stops the running session.
    ///
    /// Fails with [`SupervisorError::NotRunning`] unless the state is
    /// `Running`. The periodic timer is cancelled first, then the closing
    /// snapshot runs (best-effort) while the process is still up, then the
    /// child is terminated. Returns once the exit is confirmed, or after an
    /// unconditional fallback timeout that abandons the child.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let (scheduler, stop, watcher) = {
            let mut inner = self.inner.lock().await;

            let current = *self.state.borrow();
            if current != LifecycleState::Running {
                return Err(SupervisorError::NotRunning { state: current });
            }

            self.state.send_replace(LifecycleState::Stopping);
            self.bus.lifecycle("stopping supervised process");

            if let Some(token) = inner.scheduler_token.take() {
                token.cancel();
            }
            (inner.scheduler.take(), inner.stop.take(), inner.watcher.take())
        };

        // Closing snapshot while the process can still serve the export;
        // its failure is reported on the bus and never blocks shutdown.
        if let Some(scheduler) = scheduler {
            scheduler.closing_snapshot().await;
        }

        if let Some(token) = stop {
            token.cancel();
        }

        if let Some(mut watcher) = watcher {
            let confirm = self.cfg.grace + KILL_CONFIRM_MARGIN;
            if time::timeout(confirm, &mut watcher).await.is_err() {
                // Unconditional fallback: abandon the child (kill-on-drop
                // reaps it) and return the supervisor to Idle regardless.
                watcher.abort();
                let mut inner = self.inner.lock().await;
                inner.handle = None;
                inner.stop = None;
                self.state.send_replace(LifecycleState::Idle);
                self.bus
                    .lifecycle("termination not confirmed in time; abandoning process");
            }
        }
        Ok(())
    }

    /// Pure read of the current state; no side effects.
    pub async fn status(&self) -> Status {
        let state = *self.state.borrow();
        let pid = self
            .inner
            .lock()
            .await
            .handle
            .as_ref()
            .and_then(|h| h.pid);
        Status {
            running: state == LifecycleState::Running,
            state,
            pid,
        }
    }

    /// Live view of the lifecycle state, for observers and tests.
    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }
}

/// Decodes one output pipe into line events until EOF.
fn spawn_line_reader<R>(bus: LogBus, tag: StreamTag, reader: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            bus.publish(LogEvent::new(tag, line));
        }
    })
}

/// Owns the child for its whole life: waits for a natural exit or a stop
/// request, performs the termination sequence, then does the exit
/// bookkeeping under the supervisor mutex.
async fn watch_child(
    mut child: Child,
    stop: CancellationToken,
    inner: Arc<Mutex<Inner>>,
    state: Arc<watch::Sender<LifecycleState>>,
    bus: LogBus,
    grace: Duration,
) {
    let status = select! {
        status = child.wait() => status,
        _ = stop.cancelled() => terminate(&mut child, grace, &bus).await,
    };
    let code = status.as_ref().ok().and_then(|s| s.code());

    let mut inner = inner.lock().await;
    if let Some(token) = inner.scheduler_token.take() {
        token.cancel();
    }
    inner.scheduler = None;
    inner.handle = None;
    inner.stop = None;
    inner.watcher = None;

    let current = *state.borrow();
    match current {
        LifecycleState::Stopping => {
            state.send_replace(LifecycleState::Idle);
            bus.lifecycle(match code {
                Some(c) => format!("supervised process exited with code {c}"),
                None => "supervised process terminated".to_string(),
            });
        }
        LifecycleState::Running => {
            // No stop was requested: this is a crash, not an error.
            state.send_replace(LifecycleState::CrashExited);
            bus.lifecycle(match code {
                Some(c) => format!("supervised process exited unexpectedly with code {c}"),
                None => "supervised process exited unexpectedly".to_string(),
            });
        }
        _ => {}
    }
}

/// Terminates the child: graceful signal to the process group, bounded
/// wait, then a forceful kill.
///
/// Platform choice: on Unix the child leads its own process group, so
/// SIGTERM/SIGKILL to the group reach the whole tree the tool may have
/// spawned. Elsewhere no portable graceful tree signal exists, so the
/// direct child is killed forcefully.
#[cfg(unix)]
async fn terminate(
    child: &mut Child,
    grace: Duration,
    bus: &LogBus,
) -> std::io::Result<std::process::ExitStatus> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
    match time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_elapsed) => {
            bus.lifecycle("graceful shutdown timed out; killing process group");
            if let Some(pid) = child.id() {
                let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
            }
            let _ = child.start_kill();
            child.wait().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate(
    child: &mut Child,
    _grace: Duration,
    _bus: &LogBus,
) -> std::io::Result<std::process::ExitStatus> {
    let _ = child.start_kill();
    child.wait().await
}
