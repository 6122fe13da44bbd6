//! Snapshot Poller
//!
//! Periodic HTTP fallback for the market stream. Every interval it fetches
//! the snapshot endpoint for each tracked symbol and forwards the result
//! as a poll-sourced market update. The poller runs alongside the stream
//! and the store's last-write-wins rule keeps the two from fighting.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::endpoint::Endpoint;
use crate::domain::market::{Candle, MarketUpdate, OrderFlowSnapshot, VolumeProfileSummary};

/// Default interval between poll sweeps.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Response body of the market snapshot endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotResponse {
    /// Symbol the snapshot describes.
    pub symbol: String,
    /// Recent closed candles, oldest first.
    #[serde(default)]
    pub candles: Vec<Candle>,
    /// Current volume profile, when available.
    #[serde(default)]
    pub volume_profile: Option<VolumeProfileSummary>,
    /// Current order flow metrics, when available.
    #[serde(default)]
    pub order_flow: Option<OrderFlowSnapshot>,
}

/// Errors from one snapshot fetch.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The HTTP request failed or returned an error status.
    #[error("snapshot request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Map a snapshot to a market update keyed on its most recent candle.
///
/// Returns `None` when the snapshot carries no candles; there is nothing
/// to timestamp the update with.
#[must_use]
pub fn snapshot_to_update(snapshot: SnapshotResponse) -> Option<MarketUpdate> {
    let last = snapshot.candles.last()?;
    Some(MarketUpdate {
        symbol: snapshot.symbol,
        timestamp: last.timestamp,
        price: last.close,
        volume_profile: snapshot.volume_profile,
        order_flow: snapshot.order_flow,
    })
}

/// Configuration for the snapshot poller.
#[derive(Debug, Clone)]
pub struct SnapshotPollerConfig {
    /// Resolved backend endpoint.
    pub endpoint: Endpoint,
    /// Symbols to poll each sweep.
    pub symbols: Vec<String>,
    /// Interval between sweeps.
    pub interval: Duration,
}

/// Periodic snapshot poller.
#[derive(Debug)]
pub struct SnapshotPoller {
    config: SnapshotPollerConfig,
    http: reqwest::Client,
    updates: mpsc::Sender<MarketUpdate>,
    cancel: CancellationToken,
}

impl SnapshotPoller {
    /// Create a poller that forwards updates on the given channel until
    /// the token is cancelled.
    #[must_use]
    pub fn new(
        config: SnapshotPollerConfig,
        updates: mpsc::Sender<MarketUpdate>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            updates,
            cancel,
        }
    }

    /// Poll on the configured interval until cancellation.
    ///
    /// The first sweep fires immediately so a fresh session has data
    /// before the stream finishes its handshake.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Snapshot poller stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            for symbol in &self.config.symbols {
                match self.poll_symbol(symbol).await {
                    Ok(Some(update)) => {
                        if self.updates.send(update).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(symbol = %symbol, "Snapshot has no candles, skipping");
                    }
                    Err(e) => {
                        // Poll failures are transient; the next sweep retries.
                        tracing::warn!(symbol = %symbol, error = %e, "Snapshot poll failed");
                    }
                }
            }
        }
    }

    /// Fetch and map one symbol's snapshot.
    async fn poll_symbol(&self, symbol: &str) -> Result<Option<MarketUpdate>, PollError> {
        let url = self.config.endpoint.market_snapshot_url(symbol);
        let snapshot: SnapshotResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(snapshot_to_update(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::*;

    fn candle(hour: u32, close: i64) -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 8, 29, hour, 0, 0).unwrap(),
            open: Decimal::from(close - 10),
            high: Decimal::from(close + 20),
            low: Decimal::from(close - 20),
            close: Decimal::from(close),
            volume: Decimal::from(100),
        }
    }

    #[test]
    fn update_comes_from_last_candle() {
        let snapshot = SnapshotResponse {
            symbol: "BTCUSDT".to_string(),
            candles: vec![candle(9, 45_000), candle(10, 45_200)],
            volume_profile: None,
            order_flow: None,
        };

        let update = snapshot_to_update(snapshot).unwrap();
        assert_eq!(update.symbol, "BTCUSDT");
        assert_eq!(update.price, Decimal::from(45_200));
        assert_eq!(
            update.timestamp,
            Utc.with_ymd_and_hms(2026, 8, 29, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn empty_snapshot_yields_no_update() {
        let snapshot = SnapshotResponse {
            symbol: "BTCUSDT".to_string(),
            candles: Vec::new(),
            volume_profile: None,
            order_flow: None,
        };
        assert!(snapshot_to_update(snapshot).is_none());
    }
}
