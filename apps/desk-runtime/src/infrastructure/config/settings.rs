//! Runtime Configuration Settings
//!
//! Configuration types for the desk runtime, loaded from environment
//! variables. Every knob has a default; the runtime starts with an empty
//! environment.

use std::time::Duration;

use crate::domain::endpoint::BackendLocator;
use crate::domain::service::DEFAULT_READINESS_TIMEOUT;
use crate::infrastructure::probe::DEFAULT_PROBE_TIMEOUT;
use crate::infrastructure::process::DEFAULT_STOP_GRACE;
use crate::infrastructure::stream::poller::DEFAULT_POLL_INTERVAL;
use crate::infrastructure::stream::reconnect::DEFAULT_RECONNECT_DELAY;

/// Symbols tracked when `DESK_SYMBOLS` is not set.
pub const DEFAULT_SYMBOLS: [&str; 4] = ["BTCUSDT", "ETHUSDT", "LTCUSDT", "DOGEUSDT"];

/// Backend location settings.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Whether this process hosts the backend itself.
    pub embedded: bool,
    /// Explicit backend base URL, when advertised by the environment.
    /// `Some("")` means same-origin proxied paths.
    pub backend_url: Option<String>,
    /// Port the locally spawned backend listens on.
    pub port: u16,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            embedded: false,
            backend_url: None,
            port: BackendLocator::DEFAULT_LOCAL_PORT,
        }
    }
}

/// Stream session settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Fixed delay between reconnection attempts.
    pub reconnect_delay: Duration,
    /// Jitter factor applied to the reconnect delay.
    pub reconnect_jitter: f64,
    /// Interval between snapshot poll sweeps.
    pub poll_interval: Duration,
    /// Symbols polled each sweep.
    pub symbols: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            reconnect_jitter: 0.0,
            poll_interval: DEFAULT_POLL_INTERVAL,
            symbols: DEFAULT_SYMBOLS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Bounded wait for a readiness marker before failing open.
    pub readiness_timeout: Duration,
    /// Grace period between the graceful signal and the forced kill.
    pub stop_grace: Duration,
    /// Bounded wait for each optional-dependency probe.
    pub probe_timeout: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            stop_grace: DEFAULT_STOP_GRACE,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Broadcast channel settings.
#[derive(Debug, Clone)]
pub struct HubSettings {
    /// Capacity of the market update channel.
    pub updates_capacity: usize,
    /// Capacity of the signal channel.
    pub signals_capacity: usize,
    /// Capacity of the connection state channel.
    pub connection_capacity: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            updates_capacity: 1_000,
            signals_capacity: 100,
            connection_capacity: 16,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Backend location settings.
    pub backend: BackendSettings,
    /// Stream session settings.
    pub session: SessionSettings,
    /// Supervisor settings.
    pub supervisor: SupervisorSettings,
    /// Broadcast channel settings.
    pub hub: HubSettings,
}

impl RuntimeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DESK_SYMBOLS` is set but contains no symbols.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = BackendSettings {
            embedded: parse_env_bool("DESK_EMBEDDED_BACKEND", BackendSettings::default().embedded),
            backend_url: std::env::var("DESK_BACKEND_URL").ok(),
            port: parse_env_u16("DESK_BACKEND_PORT", BackendSettings::default().port),
        };

        let symbols = match std::env::var("DESK_SYMBOLS") {
            Ok(raw) => {
                let symbols: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect();
                if symbols.is_empty() {
                    return Err(ConfigError::EmptyValue("DESK_SYMBOLS".to_string()));
                }
                symbols
            }
            Err(_) => SessionSettings::default().symbols,
        };

        let session = SessionSettings {
            reconnect_delay: parse_env_duration_secs(
                "DESK_RECONNECT_DELAY_SECS",
                SessionSettings::default().reconnect_delay,
            ),
            reconnect_jitter: parse_env_f64(
                "DESK_RECONNECT_JITTER",
                SessionSettings::default().reconnect_jitter,
            ),
            poll_interval: parse_env_duration_secs(
                "DESK_POLL_INTERVAL_SECS",
                SessionSettings::default().poll_interval,
            ),
            symbols,
        };

        let supervisor = SupervisorSettings {
            readiness_timeout: parse_env_duration_secs(
                "DESK_READINESS_TIMEOUT_SECS",
                SupervisorSettings::default().readiness_timeout,
            ),
            stop_grace: parse_env_duration_secs(
                "DESK_STOP_GRACE_SECS",
                SupervisorSettings::default().stop_grace,
            ),
            probe_timeout: parse_env_duration_secs(
                "DESK_PROBE_TIMEOUT_SECS",
                SupervisorSettings::default().probe_timeout,
            ),
        };

        let hub = HubSettings {
            updates_capacity: parse_env_usize(
                "DESK_UPDATES_CAPACITY",
                HubSettings::default().updates_capacity,
            ),
            signals_capacity: parse_env_usize(
                "DESK_SIGNALS_CAPACITY",
                HubSettings::default().signals_capacity,
            ),
            connection_capacity: parse_env_usize(
                "DESK_CONNECTION_CAPACITY",
                HubSettings::default().connection_capacity,
            ),
        };

        Ok(Self {
            backend,
            session,
            supervisor,
            hub,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).map_or(default, |v| {
        matches!(v.to_lowercase().as_str(), "1" | "true" | "yes")
    })
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}
