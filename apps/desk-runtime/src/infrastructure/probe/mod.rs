//! Dependency Reachability Probe
//!
//! Performs a single bounded-time TCP connection attempt against an
//! optional dependency's advertised address. Absence is an expected,
//! recoverable outcome: every failure mode (timeout, refusal, I/O error)
//! collapses into `reachable = false` and nothing is raised to the caller.

use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpStream;

use crate::domain::service::DependencyStatus;

/// Default bounded wait for one probe attempt.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Bounded-time reachability probe.
#[derive(Debug, Clone, Copy)]
pub struct DependencyProbe;

impl DependencyProbe {
    /// Attempt one bounded connection to `addr`.
    ///
    /// The connection is closed immediately on success; the only side
    /// effect is the transient network attempt itself.
    pub async fn probe(name: &str, addr: &str, timeout: Duration) -> DependencyStatus {
        let reachable = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                true
            }
            Ok(Err(e)) => {
                tracing::debug!(service = name, addr, error = %e, "Dependency probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(
                    service = name,
                    addr,
                    timeout_ms = timeout.as_millis(),
                    "Dependency probe timed out"
                );
                false
            }
        };

        DependencyStatus {
            name: name.to_string(),
            reachable,
            checked_at: Utc::now(),
        }
    }
}
