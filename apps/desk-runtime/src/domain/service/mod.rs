//! Managed Service Types
//!
//! Describes the locally-hosted services the supervisor brings up: the
//! immutable [`ServiceDescriptor`], the probe result for optional
//! dependencies, and the pure lifecycle state machine for managed
//! processes.
//!
//! The state machine is a pure mapping from (state, event) to state so the
//! lifecycle can be tested without spawning a real process. The fail-open
//! readiness outcome is the explicit [`ServiceState::ReadyDegraded`] state
//! rather than an implicit timer race.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Default bounded wait for a readiness marker before failing open.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(15);

// =============================================================================
// Service Descriptor
// =============================================================================

/// Command used to spawn a managed service process.
#[derive(Debug, Clone)]
pub struct ServiceCommand {
    /// Program path or name resolved via `PATH`.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Environment overrides layered on top of the parent environment.
    pub env: HashMap<String, String>,
}

/// Immutable description of one managed or probed service.
///
/// Built once at application start. Optional services carry a probe address
/// and are never spawned by the supervisor; managed services carry a
/// command and a readiness marker convention.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    name: String,
    command: Option<ServiceCommand>,
    probe_addr: Option<String>,
    readiness_marker: Option<String>,
    readiness_timeout: Duration,
    optional: bool,
}

impl ServiceDescriptor {
    /// Create a descriptor with only a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: None,
            probe_addr: None,
            readiness_marker: None,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            optional: false,
        }
    }

    /// Set the spawn command.
    #[must_use]
    pub fn with_command(
        mut self,
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.command = Some(ServiceCommand {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
        });
        self
    }

    /// Add an environment override for the spawned process.
    ///
    /// No effect if no command has been set yet.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Some(command) = self.command.as_mut() {
            command.env.insert(key.into(), value.into());
        }
        self
    }

    /// Set the advertised address used to probe this dependency.
    #[must_use]
    pub fn with_probe_addr(mut self, addr: impl Into<String>) -> Self {
        self.probe_addr = Some(addr.into());
        self
    }

    /// Set the stdout substring that signals readiness.
    #[must_use]
    pub fn with_readiness_marker(mut self, marker: impl Into<String>) -> Self {
        self.readiness_marker = Some(marker.into());
        self
    }

    /// Set the bounded wait for the readiness marker.
    #[must_use]
    pub const fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    /// Mark this service as an optional dependency.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn command, if this service is managed.
    #[must_use]
    pub const fn command(&self) -> Option<&ServiceCommand> {
        self.command.as_ref()
    }

    /// Probe address, if this service is an external dependency.
    #[must_use]
    pub fn probe_addr(&self) -> Option<&str> {
        self.probe_addr.as_deref()
    }

    /// Readiness marker substring.
    #[must_use]
    pub fn readiness_marker(&self) -> Option<&str> {
        self.readiness_marker.as_deref()
    }

    /// Bounded readiness wait.
    #[must_use]
    pub const fn readiness_timeout(&self) -> Duration {
        self.readiness_timeout
    }

    /// Whether absence of this service is tolerated.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }
}

// =============================================================================
// Dependency Status
// =============================================================================

/// Result of a single bounded reachability probe.
///
/// Produced by the probe, consumed once by the supervisor when it makes its
/// degrade-vs-fail decision; not retained after startup.
#[derive(Debug, Clone)]
pub struct DependencyStatus {
    /// Name of the probed descriptor.
    pub name: String,
    /// Whether the dependency answered within the bounded wait.
    pub reachable: bool,
    /// When the probe ran.
    pub checked_at: DateTime<Utc>,
}

// =============================================================================
// Lifecycle State Machine
// =============================================================================

/// Lifecycle state of a managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Spawned, waiting for the readiness marker.
    Starting,
    /// Readiness marker observed on stdout.
    Ready,
    /// Readiness timeout elapsed without a marker; treated as ready
    /// (fail-open) so a slow service cannot block the host forever.
    ReadyDegraded,
    /// Process exited before becoming ready. Terminal.
    Failed,
    /// Graceful termination in progress.
    Terminating,
    /// Process has exited after a stop request. Terminal.
    Stopped,
}

/// Events that drive [`ServiceState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEvent {
    /// The readiness marker was observed on the process's stdout.
    MarkerSeen,
    /// The bounded readiness wait elapsed.
    ReadinessTimeout,
    /// The process exited on its own.
    Exited,
    /// A stop was requested by the supervisor.
    StopRequested,
    /// Termination (graceful or escalated) completed.
    StopCompleted,
}

impl ServiceState {
    /// Apply one event, returning the next state.
    ///
    /// Terminal states absorb every event; unrelated events leave the state
    /// unchanged.
    #[must_use]
    pub const fn next(self, event: ServiceEvent) -> Self {
        match (self, event) {
            (Self::Starting, ServiceEvent::MarkerSeen) => Self::Ready,
            (Self::Starting, ServiceEvent::ReadinessTimeout) => Self::ReadyDegraded,
            (Self::Starting | Self::Ready | Self::ReadyDegraded, ServiceEvent::Exited) => {
                Self::Failed
            }
            (
                Self::Starting | Self::Ready | Self::ReadyDegraded,
                ServiceEvent::StopRequested,
            ) => Self::Terminating,
            (Self::Terminating, ServiceEvent::StopCompleted | ServiceEvent::Exited) => {
                Self::Stopped
            }
            (state, _) => state,
        }
    }

    /// Whether the service counts as ready for bootstrap ordering.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::ReadyDegraded)
    }

    /// Whether the underlying process may still be running.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Starting | Self::Ready | Self::ReadyDegraded)
    }

    /// Whether this state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }
}
