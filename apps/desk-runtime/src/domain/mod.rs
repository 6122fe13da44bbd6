//! Domain Layer - Core supervision and streaming types.
//!
//! This layer contains the pure types and state machines the runtime is
//! built on, with no I/O dependencies. All types here are plain Rust with
//! serialization support where the wire needs it.

/// Managed service descriptors and the process lifecycle state machine.
pub mod service;

/// Stream connection state machine.
pub mod connection;

/// Market data payloads and the last-write-wins store.
pub mod market;

/// Backend endpoint resolution.
pub mod endpoint;
