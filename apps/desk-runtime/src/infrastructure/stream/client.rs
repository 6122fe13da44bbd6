//! Market Stream Client
//!
//! Owns one WebSocket session against the backend stream endpoint:
//! connect, decode frames, emit typed events, and reconnect after a fixed
//! delay whenever the connection drops. The session ends only when the
//! cancellation token fires; the [`ConnectionState::Closed`] state is
//! reached through no other path.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use crate::domain::connection::{ConnectionEvent, ConnectionState};
use crate::domain::market::{MarketUpdate, TradingSignal};
use crate::infrastructure::stream::codec::{ServerFrame, decode_frame};
use crate::infrastructure::stream::reconnect::{ReconnectConfig, ReconnectPolicy};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Typed events emitted by the stream client.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A market update pushed by the backend.
    Update(MarketUpdate),
    /// A trading signal pushed by the backend.
    Signal(TradingSignal),
    /// The connection state changed.
    State(ConnectionState),
}

/// Configuration for the stream client.
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// WebSocket URL of the stream endpoint.
    pub url: String,
    /// Reconnection behavior after drops and failed attempts.
    pub reconnect: ReconnectConfig,
}

/// Outcome of one connected read loop.
enum ReadOutcome {
    /// The peer dropped the connection or the transport failed.
    Lost,
    /// The session was cancelled from our side.
    Cancelled,
}

/// Reconnecting WebSocket client for the backend market stream.
#[derive(Debug)]
pub struct StreamClient {
    config: StreamClientConfig,
    events: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl StreamClient {
    /// Create a client that emits events on the given channel until the
    /// token is cancelled.
    #[must_use]
    pub const fn new(
        config: StreamClientConfig,
        events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            events,
            cancel,
        }
    }

    /// Drive the session until cancellation.
    ///
    /// Connection drops and failed attempts reconnect after the fixed
    /// policy delay, indefinitely. Returns once the token fires or every
    /// event receiver is gone.
    pub async fn run(self) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());
        let mut state = ConnectionState::Disconnected;

        loop {
            state = self.transition(state, ConnectionEvent::ConnectStarted).await;

            let connected = tokio::select! {
                () = self.cancel.cancelled() => {
                    self.transition(state, ConnectionEvent::CloseRequested).await;
                    return;
                }
                result = connect_async(self.config.url.as_str()) => result,
            };

            match connected {
                Ok((ws, _response)) => {
                    policy.reset();
                    state = self
                        .transition(state, ConnectionEvent::ConnectSucceeded)
                        .await;
                    tracing::info!(url = %self.config.url, "Stream connected");

                    match self.read_frames(ws).await {
                        ReadOutcome::Lost => {
                            state = self
                                .transition(state, ConnectionEvent::ConnectionLost)
                                .await;
                        }
                        ReadOutcome::Cancelled => {
                            self.transition(state, ConnectionEvent::CloseRequested).await;
                            return;
                        }
                    }
                }
                Err(e) => {
                    state = self.transition(state, ConnectionEvent::ConnectFailed).await;
                    tracing::warn!(url = %self.config.url, error = %e, "Stream connect failed");
                }
            }

            let delay = policy.next_delay();
            tracing::info!(
                retry_ms = delay.as_millis(),
                attempt = policy.attempt_count(),
                "Reconnecting to stream"
            );
            tokio::select! {
                () = self.cancel.cancelled() => {
                    self.transition(state, ConnectionEvent::CloseRequested).await;
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Read frames until the connection drops or the session is cancelled.
    async fn read_frames(&self, mut ws: WsStream) -> ReadOutcome {
        loop {
            let message = tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = ws.close(None).await;
                    return ReadOutcome::Cancelled;
                }
                message = ws.next() => message,
            };

            match message {
                Some(Ok(Message::Text(text))) => {
                    if !self.dispatch_frame(text.as_str()).await {
                        return ReadOutcome::Cancelled;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if ws.send(Message::Pong(payload)).await.is_err() {
                        return ReadOutcome::Lost;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(frame = ?frame, "Stream closed by peer");
                    return ReadOutcome::Lost;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Stream transport error");
                    return ReadOutcome::Lost;
                }
                None => {
                    tracing::info!("Stream ended");
                    return ReadOutcome::Lost;
                }
            }
        }
    }

    /// Decode and forward one frame. Returns `false` once every event
    /// receiver is gone.
    async fn dispatch_frame(&self, text: &str) -> bool {
        match decode_frame(text) {
            Ok(ServerFrame::MarketUpdate(update)) => self
                .events
                .send(StreamEvent::Update(update))
                .await
                .is_ok(),
            Ok(ServerFrame::NewSignal { signal }) => {
                tracing::info!(
                    symbol = %signal.symbol,
                    signal_type = %signal.signal_type,
                    model = %signal.model,
                    confidence = signal.confidence_score,
                    "Signal received"
                );
                self.events.send(StreamEvent::Signal(signal)).await.is_ok()
            }
            Ok(ServerFrame::Unknown) => {
                tracing::debug!("Ignoring unknown frame type");
                true
            }
            Err(e) => {
                // Malformed frames are skipped; the connection stays up.
                tracing::warn!(error = %e, "Dropping malformed frame");
                true
            }
        }
    }

    /// Advance the connection state machine, emitting a state event on
    /// every actual change.
    async fn transition(
        &self,
        state: ConnectionState,
        event: ConnectionEvent,
    ) -> ConnectionState {
        let next = state.next(event);
        if next != state {
            tracing::debug!(from = ?state, to = ?next, "Connection state changed");
            let _ = self.events.send(StreamEvent::State(next)).await;
        }
        next
    }
}
