//! Broadcast Channel Adapters
//!
//! Fans out the merged session feed to in-process consumers using tokio
//! broadcast channels.
//!
//! # Architecture
//!
//! The `UpdateHub` provides separate channels per feed:
//! - Market updates, after the store has accepted them
//! - Trading signals pushed over the stream
//! - Connection state changes of the stream session
//!
//! Each channel supports multiple receivers with configurable capacity.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::domain::connection::ConnectionState;
use crate::domain::market::{MarketUpdate, TradingSignal, UpdateSource};

// =============================================================================
// Broadcast Messages
// =============================================================================

/// Market update broadcast message.
#[derive(Debug, Clone)]
pub struct MarketUpdateBroadcast {
    /// The accepted update.
    pub update: MarketUpdate,
    /// Where the update came from.
    pub source: UpdateSource,
}

/// Trading signal broadcast message.
#[derive(Debug, Clone)]
pub struct SignalBroadcast {
    /// The signal data.
    pub signal: TradingSignal,
}

/// Connection state broadcast message.
#[derive(Debug, Clone)]
pub struct ConnectionBroadcast {
    /// The new connection state.
    pub state: ConnectionState,
}

// =============================================================================
// Update Hub
// =============================================================================

/// Configuration for broadcast channel capacities.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Capacity for the market update channel.
    pub updates_capacity: usize,
    /// Capacity for the signal channel.
    pub signals_capacity: usize,
    /// Capacity for the connection state channel.
    pub connection_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            updates_capacity: 1_000,
            signals_capacity: 100,
            connection_capacity: 16,
        }
    }
}

/// Central hub for the merged session feed.
///
/// Provides separate channels per feed with configurable capacities and
/// supports multiple receivers per channel.
#[derive(Debug)]
pub struct UpdateHub {
    updates_tx: broadcast::Sender<MarketUpdateBroadcast>,
    signals_tx: broadcast::Sender<SignalBroadcast>,
    connection_tx: broadcast::Sender<ConnectionBroadcast>,
}

impl UpdateHub {
    /// Create a new hub with the given configuration.
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        Self {
            updates_tx: broadcast::channel(config.updates_capacity).0,
            signals_tx: broadcast::channel(config.signals_capacity).0,
            connection_tx: broadcast::channel(config.connection_capacity).0,
        }
    }

    /// Create a new hub with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(HubConfig::default())
    }

    // =========================================================================
    // Market Update Channel
    // =========================================================================

    /// Send an accepted market update to all subscribers.
    ///
    /// Returns the number of receivers that received the message, or `None`
    /// if there are no active receivers.
    #[must_use]
    pub fn send_update(&self, update: MarketUpdate, source: UpdateSource) -> Option<usize> {
        self.updates_tx
            .send(MarketUpdateBroadcast { update, source })
            .ok()
    }

    /// Get a new receiver for market updates.
    #[must_use]
    pub fn updates_rx(&self) -> broadcast::Receiver<MarketUpdateBroadcast> {
        self.updates_tx.subscribe()
    }

    /// Get the number of active market update receivers.
    #[must_use]
    pub fn updates_receiver_count(&self) -> usize {
        self.updates_tx.receiver_count()
    }

    // =========================================================================
    // Signal Channel
    // =========================================================================

    /// Send a trading signal to all subscribers.
    #[must_use]
    pub fn send_signal(&self, signal: TradingSignal) -> Option<usize> {
        self.signals_tx.send(SignalBroadcast { signal }).ok()
    }

    /// Get a new receiver for trading signals.
    #[must_use]
    pub fn signals_rx(&self) -> broadcast::Receiver<SignalBroadcast> {
        self.signals_tx.subscribe()
    }

    /// Get the number of active signal receivers.
    #[must_use]
    pub fn signals_receiver_count(&self) -> usize {
        self.signals_tx.receiver_count()
    }

    // =========================================================================
    // Connection State Channel
    // =========================================================================

    /// Send a connection state change to all subscribers.
    #[must_use]
    pub fn send_connection_state(&self, state: ConnectionState) -> Option<usize> {
        self.connection_tx.send(ConnectionBroadcast { state }).ok()
    }

    /// Get a new receiver for connection state changes.
    #[must_use]
    pub fn connection_rx(&self) -> broadcast::Receiver<ConnectionBroadcast> {
        self.connection_tx.subscribe()
    }

    /// Get the number of active connection state receivers.
    #[must_use]
    pub fn connection_receiver_count(&self) -> usize {
        self.connection_tx.receiver_count()
    }
}

/// Shared hub reference.
pub type SharedUpdateHub = Arc<UpdateHub>;

// =============================================================================
// Tests
// =============================================================================
