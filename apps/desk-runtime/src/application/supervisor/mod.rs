//! Service Supervisor
//!
//! Brings the local service stack up in declaration order and tears it
//! down in reverse. The degrade-vs-fail policy lives here: an optional
//! dependency that does not answer its probe is recorded as degraded and
//! skipped, a mandatory service that dies before becoming ready aborts
//! the bootstrap. The supervisor owns every process handle it creates;
//! there is no global registry.

use std::time::Duration;

use crate::domain::service::{DependencyStatus, ServiceDescriptor, ServiceState};
use crate::infrastructure::config::SupervisorSettings;
use crate::infrastructure::probe::DependencyProbe;
use crate::infrastructure::process::{
    ProcessError, ProcessHandle, ProcessLifecycleManager, ProcessSettings,
};

/// Result of one bootstrap pass.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    /// Whether every mandatory service came up.
    pub ready: bool,
    /// Names of services running degraded: unreachable optional
    /// dependencies and mandatory services that failed open on their
    /// readiness timeout.
    pub degraded: Vec<String>,
}

/// Errors that abort a bootstrap before any readiness decision.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// A mandatory service could not be spawned at all.
    #[error(transparent)]
    Spawn(#[from] ProcessError),
}

/// Ordered bootstrap and reverse-order shutdown of the local stack.
#[derive(Debug)]
pub struct ServiceSupervisor {
    manager: ProcessLifecycleManager,
    probe_timeout: Duration,
    descriptors: Vec<ServiceDescriptor>,
    handles: Vec<ProcessHandle>,
    external: Vec<DependencyStatus>,
}

impl ServiceSupervisor {
    /// Create a supervisor over the given descriptors, in start order.
    #[must_use]
    pub fn new(settings: &SupervisorSettings, descriptors: Vec<ServiceDescriptor>) -> Self {
        Self {
            manager: ProcessLifecycleManager::new(ProcessSettings {
                stop_grace: settings.stop_grace,
            }),
            probe_timeout: settings.probe_timeout,
            descriptors,
            handles: Vec::new(),
            external: Vec::new(),
        }
    }

    /// Bring services up in declaration order.
    ///
    /// Optional descriptors are probed, never spawned: unreachable means
    /// degraded and skipped. Mandatory descriptors are spawned and must
    /// reach `Ready` or `ReadyDegraded` before the next descriptor is
    /// touched; a mandatory service that dies first aborts the pass with
    /// `ready = false`, leaving already-started services running.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Spawn`] when a mandatory service cannot
    /// be spawned at all.
    pub async fn bootstrap(&mut self) -> Result<BootstrapOutcome, BootstrapError> {
        let mut degraded = Vec::new();
        let descriptors = self.descriptors.clone();

        for descriptor in &descriptors {
            let name = descriptor.name().to_string();

            if descriptor.is_optional() {
                let Some(addr) = descriptor.probe_addr() else {
                    tracing::warn!(service = %name, "Optional service has no probe address");
                    degraded.push(name);
                    continue;
                };

                let status = DependencyProbe::probe(&name, addr, self.probe_timeout).await;
                if status.reachable {
                    tracing::info!(service = %name, addr, "Optional dependency reachable");
                    self.external.push(status);
                } else {
                    tracing::warn!(
                        service = %name,
                        addr,
                        "Optional dependency unreachable, continuing degraded"
                    );
                    degraded.push(name);
                }
                continue;
            }

            let handle = self.manager.start(descriptor).await?;
            let state = handle.state();
            self.handles.push(handle);

            match state {
                ServiceState::Failed => {
                    tracing::error!(service = %name, "Mandatory service failed, aborting bootstrap");
                    return Ok(BootstrapOutcome {
                        ready: false,
                        degraded,
                    });
                }
                ServiceState::ReadyDegraded => degraded.push(name),
                _ => {}
            }
        }

        Ok(BootstrapOutcome {
            ready: true,
            degraded,
        })
    }

    /// Stop every started service, most recently started first.
    pub async fn shutdown(&mut self) {
        while let Some(mut handle) = self.handles.pop() {
            self.manager.stop(&mut handle).await;
        }
    }

    /// Current lifecycle state of every started service, in start order.
    #[must_use]
    pub fn states(&self) -> Vec<(&str, ServiceState)> {
        self.handles
            .iter()
            .map(|handle| (handle.name(), handle.state()))
            .collect()
    }

    /// Reachable optional dependencies discovered during bootstrap.
    #[must_use]
    pub fn external_dependencies(&self) -> &[DependencyStatus] {
        &self.external
    }
}
