//! Application Layer - Orchestration of the local service stack.

/// Ordered bootstrap and reverse-order shutdown.
pub mod supervisor;
