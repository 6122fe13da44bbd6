//! Stream Frame Codec
//!
//! Decodes the text frames pushed by the backend over the WebSocket
//! stream. Frames are JSON objects discriminated by a `type` field; types
//! this client does not know are decoded as [`ServerFrame::Unknown`] so a
//! newer backend never breaks an older client.

use serde::Deserialize;

use crate::domain::market::{MarketUpdate, TradingSignal};

/// A decoded frame from the backend stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Periodic market state push for one symbol.
    MarketUpdate(MarketUpdate),
    /// A newly generated trading signal.
    NewSignal {
        /// The signal payload.
        signal: TradingSignal,
    },
    /// A frame type this client does not understand.
    #[serde(other)]
    Unknown,
}

/// Errors from decoding a stream frame.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame was not valid JSON or did not match any known shape.
    #[error("malformed stream frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode one text frame.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] when the payload is not valid JSON or
/// a known frame type carries fields of the wrong shape. Callers log and
/// skip malformed frames; a bad frame never tears down the connection.
pub fn decode_frame(text: &str) -> Result<ServerFrame, CodecError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_market_update() {
        let text = r#"{
            "type": "market_update",
            "symbol": "BTCUSDT",
            "timestamp": "2026-08-29T10:00:00Z",
            "price": "45123.50",
            "volume_profile": {
                "poc": "45100.0",
                "vah": "45400.0",
                "val": "44800.0",
                "levels": [{"price": "45100.0", "volume": "1250.5"}]
            },
            "order_flow": {
                "cvd": "12500.0",
                "cvd_trend": "positive",
                "buy_volume": "8200.0",
                "sell_volume": "6100.0",
                "imbalance_ratio": "1.34"
            }
        }"#;

        let frame = decode_frame(text).unwrap();
        let ServerFrame::MarketUpdate(update) = frame else {
            panic!("expected market update, got {frame:?}");
        };
        assert_eq!(update.symbol, "BTCUSDT");
        assert_eq!(update.price.to_string(), "45123.50");
        assert_eq!(update.volume_profile.unwrap().levels.len(), 1);
        assert_eq!(update.order_flow.unwrap().cvd_trend, "positive");
    }

    #[test]
    fn decodes_market_update_without_optional_sections() {
        let text = r#"{
            "type": "market_update",
            "symbol": "ETHUSDT",
            "timestamp": "2026-08-29T10:00:00Z",
            "price": "2410.25"
        }"#;

        let frame = decode_frame(text).unwrap();
        let ServerFrame::MarketUpdate(update) = frame else {
            panic!("expected market update, got {frame:?}");
        };
        assert!(update.volume_profile.is_none());
        assert!(update.order_flow.is_none());
    }

    #[test]
    fn decodes_new_signal() {
        let text = r#"{
            "type": "new_signal",
            "signal": {
                "id": "7f3c2a9e-1b4d-4c8a-9f0e-2d6b5a8c7e1f",
                "timestamp": "2026-08-29T10:05:00Z",
                "symbol": "BTCUSDT",
                "signal_type": "BUY",
                "model": "TREND_CONTINUATION",
                "entry_price": "45123.50",
                "stop_loss": "44800.00",
                "take_profit": "46000.00",
                "confidence_score": 82,
                "reasoning": "CVD divergence at value area low"
            }
        }"#;

        let frame = decode_frame(text).unwrap();
        let ServerFrame::NewSignal { signal } = frame else {
            panic!("expected signal, got {frame:?}");
        };
        assert_eq!(signal.signal_type, "BUY");
        assert_eq!(signal.confidence_score, 82);
    }

    #[test]
    fn unknown_frame_type_is_tolerated() {
        let text = r#"{"type": "heartbeat", "seq": 42}"#;
        let frame = decode_frame(text).unwrap();
        assert!(matches!(frame, ServerFrame::Unknown));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(decode_frame("not json").is_err());
        assert!(decode_frame(r#"{"type": "market_update"}"#).is_err());
    }
}
