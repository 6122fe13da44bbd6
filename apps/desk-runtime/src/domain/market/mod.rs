//! Market Data Types and Store
//!
//! Canonical market data payloads shared by the push stream and the poll
//! fallback, plus the per-symbol last-write-wins store that merges the two
//! update sources.
//!
//! The wire shapes mirror what the backend broadcasts: unknown extra
//! fields are ignored, missing optional sections default to `None`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Payload Types
// =============================================================================

/// One price level of a volume profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeProfileLevel {
    /// Price of the level.
    pub price: Decimal,
    /// Traded volume at the level.
    pub volume: Decimal,
    /// Point of control marker.
    #[serde(default)]
    pub is_poc: bool,
    /// Low-volume node marker.
    #[serde(default)]
    pub is_lvn: bool,
    /// High-volume node marker.
    #[serde(default)]
    pub is_hvn: bool,
}

/// Volume profile summary attached to a market update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeProfileSummary {
    /// Point of control.
    pub poc: Decimal,
    /// Value area high.
    pub vah: Decimal,
    /// Value area low.
    pub val: Decimal,
    /// Top price levels, most significant first.
    #[serde(default)]
    pub levels: Vec<VolumeProfileLevel>,
}

/// Order flow metrics attached to a market update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFlowSnapshot {
    /// Cumulative volume delta.
    pub cvd: Decimal,
    /// CVD trend: "positive", "negative", or "neutral".
    pub cvd_trend: String,
    /// Taker buy volume over the window.
    pub buy_volume: Decimal,
    /// Taker sell volume over the window.
    pub sell_volume: Decimal,
    /// Buy/sell imbalance ratio.
    pub imbalance_ratio: Decimal,
}

/// A closed candle as served by the snapshot endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    /// Symbol the candle belongs to.
    pub symbol: String,
    /// Close time of the candle.
    pub timestamp: DateTime<Utc>,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
    /// Total volume.
    pub volume: Decimal,
}

/// A trading signal emitted by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    /// Signal identifier.
    pub id: Uuid,
    /// When the signal was generated.
    pub timestamp: DateTime<Utc>,
    /// Symbol the signal applies to.
    pub symbol: String,
    /// "BUY" or "SELL".
    pub signal_type: String,
    /// Signal model, e.g. "TREND_CONTINUATION" or "MEAN_REVERSION".
    pub model: String,
    /// Suggested entry price.
    pub entry_price: Decimal,
    /// Suggested stop loss.
    pub stop_loss: Decimal,
    /// Suggested take profit.
    pub take_profit: Decimal,
    /// Confidence score, 0-100.
    pub confidence_score: i32,
    /// Free-form reasoning from the signal engine.
    #[serde(default)]
    pub reasoning: String,
}

/// One applied market update for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketUpdate {
    /// Symbol the update applies to.
    pub symbol: String,
    /// Timestamp of the update, used for last-write-wins ordering.
    pub timestamp: DateTime<Utc>,
    /// Last price.
    pub price: Decimal,
    /// Current volume profile, when available.
    #[serde(default)]
    pub volume_profile: Option<VolumeProfileSummary>,
    /// Current order flow metrics, when available.
    #[serde(default)]
    pub order_flow: Option<OrderFlowSnapshot>,
}

// =============================================================================
// Market Data Store
// =============================================================================

/// Where an update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// Pushed over the WebSocket stream.
    Stream,
    /// Fetched by the periodic poll fallback.
    Poll,
}

/// An update retained by the store, together with its source.
#[derive(Debug, Clone)]
pub struct StoredUpdate {
    /// The retained update.
    pub update: MarketUpdate,
    /// Source that produced it.
    pub source: UpdateSource,
}

/// Per-symbol last-write-wins state container.
///
/// Merges push and poll updates per symbol: the update with the latest
/// timestamp is retained, and on a timestamp tie the stream source wins
/// over the poll source. Writes are serialized (a single session task owns
/// them); reads never block on I/O and return `None` for unknown symbols.
#[derive(Debug, Default)]
pub struct MarketDataStore {
    entries: RwLock<HashMap<String, StoredUpdate>>,
}

impl MarketDataStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an update, retaining it only if it wins against the current
    /// entry for its symbol.
    ///
    /// Returns `true` when the update was retained.
    pub fn apply(&self, update: MarketUpdate, source: UpdateSource) -> bool {
        let mut entries = self.entries.write();
        match entries.get(&update.symbol) {
            Some(current) if !wins(&update, source, current) => false,
            _ => {
                let symbol = update.symbol.clone();
                entries.insert(symbol, StoredUpdate { update, source });
                true
            }
        }
    }

    /// Get the latest retained update for a symbol.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<StoredUpdate> {
        self.entries.read().get(symbol).cloned()
    }

    /// Symbols with at least one retained update.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Number of symbols with retained data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no data yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop all retained data. Only used on full application restart.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Last-write-wins rule: strictly newer always wins; an equal timestamp
/// wins only for the stream source.
fn wins(incoming: &MarketUpdate, source: UpdateSource, current: &StoredUpdate) -> bool {
    incoming.timestamp > current.update.timestamp
        || (incoming.timestamp == current.update.timestamp && source == UpdateSource::Stream)
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use proptest::prelude::*;

    use super::*;

    fn update(symbol: &str, offset_ms: i64, price: u32) -> MarketUpdate {
        let base = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        MarketUpdate {
            symbol: symbol.to_string(),
            timestamp: base + TimeDelta::milliseconds(offset_ms),
            price: Decimal::from(price),
            volume_profile: None,
            order_flow: None,
        }
    }

    #[test]
    fn unknown_symbol_returns_none() {
        let store = MarketDataStore::new();
        assert!(store.get("BTCUSDT").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn first_update_is_retained() {
        let store = MarketDataStore::new();
        assert!(store.apply(update("BTCUSDT", 0, 100), UpdateSource::Poll));
        let stored = store.get("BTCUSDT").unwrap();
        assert_eq!(stored.update.price, Decimal::from(100));
        assert_eq!(stored.source, UpdateSource::Poll);
    }

    #[test]
    fn stale_poll_update_does_not_overwrite() {
        let store = MarketDataStore::new();
        assert!(store.apply(update("BTCUSDT", 1_000, 101), UpdateSource::Stream));
        assert!(!store.apply(update("BTCUSDT", 500, 99), UpdateSource::Poll));

        let stored = store.get("BTCUSDT").unwrap();
        assert_eq!(stored.update.price, Decimal::from(101));
        assert_eq!(stored.source, UpdateSource::Stream);
    }

    #[test]
    fn equal_timestamps_stream_beats_poll() {
        let store = MarketDataStore::new();
        assert!(store.apply(update("BTCUSDT", 0, 100), UpdateSource::Poll));
        assert!(store.apply(update("BTCUSDT", 0, 101), UpdateSource::Stream));

        let stored = store.get("BTCUSDT").unwrap();
        assert_eq!(stored.update.price, Decimal::from(101));
        assert_eq!(stored.source, UpdateSource::Stream);
    }

    #[test]
    fn equal_timestamps_poll_does_not_replace_stream() {
        let store = MarketDataStore::new();
        assert!(store.apply(update("BTCUSDT", 0, 101), UpdateSource::Stream));
        assert!(!store.apply(update("BTCUSDT", 0, 100), UpdateSource::Poll));

        let stored = store.get("BTCUSDT").unwrap();
        assert_eq!(stored.source, UpdateSource::Stream);
    }

    #[test]
    fn newer_poll_beats_older_stream() {
        let store = MarketDataStore::new();
        assert!(store.apply(update("BTCUSDT", 0, 100), UpdateSource::Stream));
        assert!(store.apply(update("BTCUSDT", 1_000, 102), UpdateSource::Poll));

        let stored = store.get("BTCUSDT").unwrap();
        assert_eq!(stored.update.price, Decimal::from(102));
        assert_eq!(stored.source, UpdateSource::Poll);
    }

    #[test]
    fn symbols_are_independent() {
        let store = MarketDataStore::new();
        assert!(store.apply(update("BTCUSDT", 1_000, 100), UpdateSource::Stream));
        assert!(store.apply(update("ETHUSDT", 0, 10), UpdateSource::Poll));

        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get("ETHUSDT").unwrap().update.price,
            Decimal::from(10)
        );
    }

    #[test]
    fn clear_drops_everything() {
        let store = MarketDataStore::new();
        assert!(store.apply(update("BTCUSDT", 0, 100), UpdateSource::Stream));
        store.clear();
        assert!(store.is_empty());
        assert!(store.get("BTCUSDT").is_none());
    }

    #[test]
    fn market_update_parses_with_unknown_fields() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "timestamp": "2024-01-01T00:00:00Z",
            "price": "50000.5",
            "unexpected": {"nested": true}
        }"#;
        let parsed: MarketUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.symbol, "BTCUSDT");
        assert!(parsed.volume_profile.is_none());
        assert!(parsed.order_flow.is_none());
    }

    proptest! {
        // For any interleaving of push and poll updates, the store retains
        // the maximum timestamp seen, and a stream update at that timestamp
        // always beats a poll update at the same timestamp.
        #[test]
        fn retains_latest_timestamp(seq in prop::collection::vec((0i64..50, any::<bool>()), 1..64)) {
            let store = MarketDataStore::new();
            for (offset, from_stream) in &seq {
                let source = if *from_stream { UpdateSource::Stream } else { UpdateSource::Poll };
                store.apply(update("BTCUSDT", *offset, 1), source);
            }

            let max_offset = seq.iter().map(|(offset, _)| *offset).max().unwrap();
            let stream_at_max = seq.iter().any(|(offset, from_stream)| *offset == max_offset && *from_stream);

            let stored = store.get("BTCUSDT").unwrap();
            prop_assert_eq!(stored.update.timestamp, update("BTCUSDT", max_offset, 1).timestamp);
            if stream_at_max {
                prop_assert_eq!(stored.source, UpdateSource::Stream);
            }
        }
    }
}
