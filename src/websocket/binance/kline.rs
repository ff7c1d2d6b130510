use serde::{Deserialize, Serialize};

use crate::historical::structs::Candle;
use crate::websocket::types::{StreamType, WebSocketError, WebSocketMessage};

/// Binance kline WebSocket event envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BinanceKlineEvent {
    /// Event type - should be "kline"
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time (timestamp in milliseconds)
    #[serde(rename = "E")]
    pub event_time: i64,

    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,

    /// Kline data
    #[serde(rename = "k")]
    pub kline: BinanceKlineData,
}

/// The kline payload, trimmed to the fields this pipeline consumes.
/// Prices and volume arrive as strings on the wire.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BinanceKlineData {
    /// Kline start time (timestamp in milliseconds)
    #[serde(rename = "t")]
    pub start_time: i64,

    /// Kline close time (timestamp in milliseconds)
    #[serde(rename = "T")]
    pub close_time: i64,

    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,

    /// Interval
    #[serde(rename = "i")]
    pub interval: String,

    /// Open price
    #[serde(rename = "o")]
    pub open: String,

    /// Close price
    #[serde(rename = "c")]
    pub close: String,

    /// High price
    #[serde(rename = "h")]
    pub high: String,

    /// Low price
    #[serde(rename = "l")]
    pub low: String,

    /// Base asset volume (cumulative for the bucket)
    #[serde(rename = "v")]
    pub volume: String,

    /// Is this kline closed? true means the bucket is complete
    #[serde(rename = "x")]
    pub is_kline_closed: bool,
}

impl BinanceKlineData {
    /// Convert to the internal candle structure
    pub fn to_candle(&self) -> Result<Candle, WebSocketError> {
        let open = self.open.parse::<f64>()
            .map_err(|_| WebSocketError::Parse(format!("Invalid open price: {}", self.open)))?;

        let high = self.high.parse::<f64>()
            .map_err(|_| WebSocketError::Parse(format!("Invalid high price: {}", self.high)))?;

        let low = self.low.parse::<f64>()
            .map_err(|_| WebSocketError::Parse(format!("Invalid low price: {}", self.low)))?;

        let close = self.close.parse::<f64>()
            .map_err(|_| WebSocketError::Parse(format!("Invalid close price: {}", self.close)))?;

        let volume = self.volume.parse::<f64>()
            .map_err(|_| WebSocketError::Parse(format!("Invalid volume: {}", self.volume)))?;

        Ok(Candle {
            open_time: self.start_time,
            open,
            high,
            low,
            close,
            volume,
            closed: self.is_kline_closed,
        })
    }

    /// Check if this is a completed candle (closed kline)
    pub fn is_completed(&self) -> bool {
        self.is_kline_closed
    }
}

impl WebSocketMessage for BinanceKlineEvent {
    type Output = BinanceKlineEvent;

    fn parse(payload: &str) -> Result<Self::Output, WebSocketError> {
        serde_json::from_str(payload)
            .map_err(|e| WebSocketError::Parse(format!("Failed to parse kline message: {}", e)))
    }

    fn stream_type() -> StreamType {
        StreamType::kline_1m()
    }
}

/// Combined stream format that wraps the event with a stream name
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BinanceCombinedStreamMessage {
    /// Stream name (e.g., "btcusdt@kline_1m")
    pub stream: String,

    /// The actual kline data
    pub data: BinanceKlineEvent,
}

impl BinanceCombinedStreamMessage {
    pub fn parse(payload: &str) -> Result<Self, WebSocketError> {
        serde_json::from_str(payload)
            .map_err(|e| WebSocketError::Parse(format!("Failed to parse combined stream message: {}", e)))
    }
}

/// Parse either single stream or combined stream format
pub fn parse_any_kline_message(payload: &str) -> Result<BinanceKlineEvent, WebSocketError> {
    // Try combined stream format first
    if let Ok(combined) = BinanceCombinedStreamMessage::parse(payload) {
        Ok(combined.data)
    } else {
        BinanceKlineEvent::parse(payload)
    }
}
