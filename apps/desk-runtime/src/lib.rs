#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Desk Runtime - Local Service Supervisor & Streaming Client
//!
//! The runtime core of a desktop trading-signal terminal. It brings up the
//! locally-hosted service stack (an optional database dependency and a
//! mandatory backend API process) in dependency order with bounded
//! readiness detection, then maintains a reconnecting typed WebSocket
//! session against the backend, merging pushed updates with a periodic
//! poll fallback into a last-write-wins per-symbol store.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and state machines
//!   - `service`: Service descriptors and the process lifecycle machine
//!   - `connection`: Stream connection state machine
//!   - `market`: Wire payloads and the market data store
//!   - `endpoint`: Backend endpoint resolution
//!
//! - **Application**: Orchestration
//!   - `supervisor`: Ordered bootstrap, degrade-vs-fail, reverse shutdown
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `probe`: Bounded TCP reachability checks
//!   - `process`: Process spawning and escalating termination
//!   - `stream`: WebSocket client, frame codec, poll fallback
//!   - `hub`: Channel-based message distribution
//!   - `config`: Environment-driven configuration
//!
//! # Data Flow
//!
//! ```text
//! Backend WS ──────┐
//!                  │    ┌─────────────┐    ┌───────────────┐
//!                  ├───►│ Store merge │───►│  Update hub   │──► Consumers
//! Snapshot poll ───┘    │ (LWW/symbol)│    │ (broadcast)   │
//!                       └─────────────┘    └───────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Pure supervision and streaming types.
pub mod domain;

/// Application layer - Orchestration of the local stack.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::connection::{ConnectionEvent, ConnectionState};
pub use domain::endpoint::{BackendLocator, Endpoint, OriginContext};
pub use domain::market::{
    Candle, MarketDataStore, MarketUpdate, OrderFlowSnapshot, StoredUpdate, TradingSignal,
    UpdateSource, VolumeProfileLevel, VolumeProfileSummary,
};
pub use domain::service::{
    DependencyStatus, ServiceCommand, ServiceDescriptor, ServiceEvent, ServiceState,
};

// Application
pub use application::supervisor::{BootstrapError, BootstrapOutcome, ServiceSupervisor};

// Infrastructure config
pub use infrastructure::config::{
    BackendSettings, ConfigError, HubSettings, RuntimeConfig, SessionSettings, SupervisorSettings,
};

// Stream session (for integration tests)
pub use infrastructure::stream::client::{StreamClient, StreamClientConfig, StreamEvent};
pub use infrastructure::stream::codec::{CodecError, ServerFrame, decode_frame};
pub use infrastructure::stream::poller::{
    SnapshotPoller, SnapshotPollerConfig, SnapshotResponse, snapshot_to_update,
};
pub use infrastructure::stream::reconnect::{ReconnectConfig, ReconnectPolicy};

// Update hub (for integration tests)
pub use infrastructure::hub::{
    ConnectionBroadcast, HubConfig, MarketUpdateBroadcast, SharedUpdateHub, SignalBroadcast,
    UpdateHub,
};

// Process management
pub use infrastructure::probe::DependencyProbe;
pub use infrastructure::process::{
    ProcessError, ProcessHandle, ProcessLifecycleManager, ProcessSettings,
};
