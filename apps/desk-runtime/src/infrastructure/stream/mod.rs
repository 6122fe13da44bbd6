//! Market Stream Infrastructure
//!
//! WebSocket session against the backend stream plus the periodic snapshot
//! poller that covers for it while disconnected.

pub mod client;
pub mod codec;
pub mod poller;
pub mod reconnect;
