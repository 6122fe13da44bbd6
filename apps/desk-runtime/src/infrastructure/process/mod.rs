//! Process Lifecycle Management
//!
//! Spawns managed service processes, watches their stdout for the
//! readiness marker, forwards all process output to the logging sink, and
//! owns escalating termination: a graceful signal first, a forced kill
//! after a grace period.
//!
//! Readiness follows the fail-open policy: a process that neither emits
//! its marker nor exits before the descriptor's readiness timeout is
//! treated as [`ServiceState::ReadyDegraded`] so a slow-but-working
//! service never blocks the host application indefinitely.

use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::oneshot;

use crate::domain::service::{ServiceDescriptor, ServiceEvent, ServiceState};

/// Default grace period between the graceful signal and the forced kill.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

// =============================================================================
// Errors
// =============================================================================

/// Errors from spawning a managed process.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The descriptor carries no spawn command.
    #[error("service {0} has no spawn command")]
    MissingCommand(String),

    /// The operating system refused to spawn the process.
    #[error("failed to spawn service {name}: {source}")]
    SpawnFailed {
        /// Service name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Process Handle
// =============================================================================

/// A managed process together with its lifecycle state.
///
/// Owned exclusively by the supervisor that started it; state changes only
/// through [`ProcessLifecycleManager`].
#[derive(Debug)]
pub struct ProcessHandle {
    name: String,
    child: Child,
    state: ServiceState,
    started_at: DateTime<Utc>,
}

impl ProcessHandle {
    /// Service name this handle belongs to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ServiceState {
        self.state
    }

    /// When the process was spawned.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

// =============================================================================
// Lifecycle Manager
// =============================================================================

/// Settings for process termination.
#[derive(Debug, Clone)]
pub struct ProcessSettings {
    /// Grace period between the graceful signal and the forced kill.
    pub stop_grace: Duration,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

/// First event observed while waiting for readiness.
enum ReadinessWait {
    /// Marker channel resolved; `true` means the marker was seen, `false`
    /// means stdout closed without it.
    Marker(bool),
    /// The process exited, with its exit code when available.
    Exited(Option<i32>),
    /// The readiness timeout elapsed.
    TimedOut,
}

/// Spawns and terminates managed service processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessLifecycleManager {
    settings: ProcessSettings,
}

impl ProcessLifecycleManager {
    /// Create a manager with the given settings.
    #[must_use]
    pub const fn new(settings: ProcessSettings) -> Self {
        Self { settings }
    }

    /// Spawn the descriptor's process and wait for it to become ready.
    ///
    /// The handle returned is in one of `Ready`, `ReadyDegraded`, or
    /// `Failed`. Stdout and stderr are drained by detached reader tasks
    /// that forward every line to the logging sink, so readiness waits
    /// never block on process output.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] if the descriptor has no command or the
    /// spawn itself fails.
    pub async fn start(
        &self,
        descriptor: &ServiceDescriptor,
    ) -> Result<ProcessHandle, ProcessError> {
        let name = descriptor.name().to_string();
        let command = descriptor
            .command()
            .ok_or_else(|| ProcessError::MissingCommand(name.clone()))?;

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ProcessError::SpawnFailed {
            name: name.clone(),
            source,
        })?;
        let started_at = Utc::now();
        tracing::info!(
            service = %name,
            program = %command.program,
            pid = child.id(),
            "Service spawned"
        );

        let (marker_tx, marker_rx) = oneshot::channel::<()>();
        if let Some(stdout) = child.stdout.take() {
            spawn_stdout_reader(
                name.clone(),
                stdout,
                descriptor.readiness_marker().map(str::to_string),
                marker_tx,
            );
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_reader(name.clone(), stderr);
        }

        let mut state = ServiceState::Starting;
        if descriptor.readiness_marker().is_none() {
            // Nothing to watch for; a marker-less service is ready once spawned.
            state = state.next(ServiceEvent::MarkerSeen);
        } else {
            let mut marker_rx = marker_rx;
            // Marker first: a process that prints its marker and exits in
            // the same instant is ready, not failed.
            let outcome = tokio::select! {
                biased;
                seen = &mut marker_rx => ReadinessWait::Marker(seen.is_ok()),
                status = child.wait() => {
                    ReadinessWait::Exited(status.ok().and_then(|s| s.code()))
                }
                () = tokio::time::sleep(descriptor.readiness_timeout()) => {
                    ReadinessWait::TimedOut
                }
            };

            match outcome {
                ReadinessWait::Marker(true) => {
                    state = state.next(ServiceEvent::MarkerSeen);
                    tracing::info!(service = %name, "Readiness marker observed");
                }
                ReadinessWait::Marker(false) => {
                    // Stdout closed without the marker; the exit or the
                    // timeout settles the outcome.
                    tokio::select! {
                        status = child.wait() => {
                            state = state.next(ServiceEvent::Exited);
                            tracing::error!(
                                service = %name,
                                exit_code = status.ok().and_then(|s| s.code()),
                                "Service exited before becoming ready"
                            );
                        }
                        () = tokio::time::sleep(descriptor.readiness_timeout()) => {
                            state = state.next(ServiceEvent::ReadinessTimeout);
                            tracing::warn!(
                                service = %name,
                                timeout_ms = descriptor.readiness_timeout().as_millis(),
                                "Readiness timeout elapsed, treating service as ready"
                            );
                        }
                    }
                }
                ReadinessWait::Exited(exit_code) => {
                    // The reader settles the marker channel at stdout EOF,
                    // so a marker printed just before the exit still counts.
                    let settled =
                        tokio::time::timeout(descriptor.readiness_timeout(), &mut marker_rx).await;
                    if matches!(settled, Ok(Ok(()))) {
                        state = state.next(ServiceEvent::MarkerSeen);
                        tracing::info!(service = %name, "Readiness marker observed");
                    } else {
                        state = state.next(ServiceEvent::Exited);
                        tracing::error!(
                            service = %name,
                            exit_code,
                            "Service exited before becoming ready"
                        );
                    }
                }
                ReadinessWait::TimedOut => {
                    state = state.next(ServiceEvent::ReadinessTimeout);
                    tracing::warn!(
                        service = %name,
                        timeout_ms = descriptor.readiness_timeout().as_millis(),
                        "Readiness timeout elapsed, treating service as ready"
                    );
                }
            }
        }

        Ok(ProcessHandle {
            name,
            child,
            state,
            started_at,
        })
    }

    /// Stop a managed process: graceful signal, then a forced kill once
    /// the grace period elapses. Idempotent; stopping an already-stopped
    /// or failed handle is a no-op.
    pub async fn stop(&self, handle: &mut ProcessHandle) {
        if !handle.state.is_running() {
            tracing::debug!(service = %handle.name, state = ?handle.state, "Stop is a no-op");
            return;
        }

        handle.state = handle.state.next(ServiceEvent::StopRequested);
        tracing::info!(service = %handle.name, "Stopping service");
        send_graceful_signal(&mut handle.child);

        match tokio::time::timeout(self.settings.stop_grace, handle.child.wait()).await {
            Ok(status) => {
                tracing::info!(
                    service = %handle.name,
                    exit_code = status.ok().and_then(|s| s.code()),
                    "Service exited"
                );
            }
            Err(_) => {
                tracing::warn!(
                    service = %handle.name,
                    grace_ms = self.settings.stop_grace.as_millis(),
                    "Grace period elapsed, killing service"
                );
                let _ = handle.child.start_kill();
                let _ = handle.child.wait().await;
            }
        }

        handle.state = handle.state.next(ServiceEvent::StopCompleted);
    }
}

// =============================================================================
// Output Readers
// =============================================================================

fn spawn_stdout_reader(
    service: String,
    stdout: ChildStdout,
    marker: Option<String>,
    marker_tx: oneshot::Sender<()>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        let mut marker_tx = Some(marker_tx);
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::info!(service = %service, "{line}");
            if let Some(marker) = marker.as_deref()
                && line.contains(marker)
                && let Some(tx) = marker_tx.take()
            {
                let _ = tx.send(());
            }
        }
    });
}

fn spawn_stderr_reader(service: String, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::warn!(service = %service, "{line}");
        }
    });
}

#[cfg(unix)]
fn send_graceful_signal(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    if let Some(id) = child.id() {
        #[allow(clippy::cast_possible_wrap)]
        if let Err(e) = kill(Pid::from_raw(id as i32), Signal::SIGTERM) {
            tracing::debug!(pid = id, error = %e, "SIGTERM delivery failed");
        }
    }
}

#[cfg(not(unix))]
fn send_graceful_signal(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(name: &str, script: &str) -> ServiceDescriptor {
        ServiceDescriptor::new(name).with_command("/bin/sh", ["-c", script])
    }

    fn manager() -> ProcessLifecycleManager {
        ProcessLifecycleManager::new(ProcessSettings {
            stop_grace: Duration::from_millis(500),
        })
    }

    #[tokio::test]
    async fn marker_match_reaches_ready() {
        let descriptor = shell("api", "echo started; sleep 10")
            .with_readiness_marker("started")
            .with_readiness_timeout(Duration::from_secs(5));

        let manager = manager();
        let mut handle = manager.start(&descriptor).await.unwrap();
        assert_eq!(handle.state(), ServiceState::Ready);

        manager.stop(&mut handle).await;
        assert_eq!(handle.state(), ServiceState::Stopped);
    }

    #[tokio::test]
    async fn early_exit_reaches_failed() {
        let descriptor = shell("api", "exit 3")
            .with_readiness_marker("never-printed")
            .with_readiness_timeout(Duration::from_secs(5));

        let handle = manager().start(&descriptor).await.unwrap();
        assert_eq!(handle.state(), ServiceState::Failed);
    }

    #[tokio::test]
    async fn marker_then_immediate_exit_counts_as_ready() {
        // The marker line and the exit land at effectively the same time;
        // the marker must win.
        let descriptor = shell("api", "echo started")
            .with_readiness_marker("started")
            .with_readiness_timeout(Duration::from_secs(5));

        let handle = manager().start(&descriptor).await.unwrap();
        assert_eq!(handle.state(), ServiceState::Ready);
    }

    #[tokio::test]
    async fn silent_process_fails_open() {
        let descriptor = shell("api", "sleep 10")
            .with_readiness_marker("never-printed")
            .with_readiness_timeout(Duration::from_millis(100));

        let manager = manager();
        let mut handle = manager.start(&descriptor).await.unwrap();
        assert_eq!(handle.state(), ServiceState::ReadyDegraded);
        assert!(handle.state().is_ready());

        manager.stop(&mut handle).await;
        assert_eq!(handle.state(), ServiceState::Stopped);
    }

    #[tokio::test]
    async fn marker_less_service_is_ready_once_spawned() {
        let descriptor = shell("api", "sleep 10");

        let manager = manager();
        let mut handle = manager.start(&descriptor).await.unwrap();
        assert_eq!(handle.state(), ServiceState::Ready);

        manager.stop(&mut handle).await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let descriptor = shell("api", "sleep 10");

        let manager = manager();
        let mut handle = manager.start(&descriptor).await.unwrap();
        manager.stop(&mut handle).await;
        assert_eq!(handle.state(), ServiceState::Stopped);

        manager.stop(&mut handle).await;
        assert_eq!(handle.state(), ServiceState::Stopped);
    }

    #[tokio::test]
    async fn stop_on_failed_handle_is_a_no_op() {
        let descriptor = shell("api", "exit 1")
            .with_readiness_marker("never")
            .with_readiness_timeout(Duration::from_secs(5));

        let manager = manager();
        let mut handle = manager.start(&descriptor).await.unwrap();
        assert_eq!(handle.state(), ServiceState::Failed);

        manager.stop(&mut handle).await;
        assert_eq!(handle.state(), ServiceState::Failed);
    }

    #[tokio::test]
    async fn missing_command_is_an_error() {
        let descriptor = ServiceDescriptor::new("db");
        let err = manager().start(&descriptor).await.unwrap_err();
        assert!(matches!(err, ProcessError::MissingCommand(name) if name == "db"));
    }

    #[tokio::test]
    async fn unspawnable_program_is_an_error() {
        let descriptor =
            ServiceDescriptor::new("api").with_command("/nonexistent/program", Vec::<String>::new());
        let err = manager().start(&descriptor).await.unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed { .. }));
    }
}
