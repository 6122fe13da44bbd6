//! Stream Connection State Machine
//!
//! Pure transition table for the stream client's connection lifecycle.
//! `Closed` is terminal and reachable only through an explicit close
//! request; every other failure path re-enters the retry loop.

/// Connection state of the stream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// Connected; frames are being read.
    Connected,
    /// Connection lost; waiting out the retry delay.
    Reconnecting,
    /// Explicitly closed. Terminal; no further automatic reconnects.
    Closed,
}

/// Events that drive [`ConnectionState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A connection attempt started.
    ConnectStarted,
    /// The transport connected.
    ConnectSucceeded,
    /// The connection attempt failed.
    ConnectFailed,
    /// An established connection errored or closed unexpectedly.
    ConnectionLost,
    /// The client was explicitly closed.
    CloseRequested,
}

impl ConnectionState {
    /// Apply one event, returning the next state.
    #[must_use]
    pub const fn next(self, event: ConnectionEvent) -> Self {
        match (self, event) {
            (Self::Closed, _) => Self::Closed,
            (_, ConnectionEvent::CloseRequested) => Self::Closed,
            (Self::Disconnected | Self::Reconnecting, ConnectionEvent::ConnectStarted) => {
                Self::Connecting
            }
            (Self::Connecting, ConnectionEvent::ConnectSucceeded) => Self::Connected,
            (Self::Connecting, ConnectionEvent::ConnectFailed) => Self::Reconnecting,
            (Self::Connected, ConnectionEvent::ConnectionLost) => Self::Reconnecting,
            (state, _) => state,
        }
    }

    /// Whether the client is in its terminal state.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether frames can currently be read.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}
