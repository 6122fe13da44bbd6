//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations around the domain types: process spawning,
//! TCP probing, the WebSocket stream client with its poll fallback, the
//! broadcast hub, and environment-driven configuration.

/// Bounded-time TCP reachability probe for optional dependencies.
pub mod probe;

/// Managed process lifecycle (spawn, readiness watch, escalating stop).
pub mod process;

/// WebSocket stream client, frame codec, reconnect policy, poll fallback.
pub mod stream;

/// Broadcast channel fan-out of classified stream messages.
pub mod hub;

/// Configuration from environment variables.
pub mod config;
