use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Supported WebSocket stream types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    /// Kline/candlestick data for a fixed interval (e.g. "1m", "1h").
    /// The stream interval must match the buffer's bucket width so that
    /// fragments stay bucket-aligned.
    Kline(String),
    /// Individual trade data
    Trade,
}

impl StreamType {
    pub fn kline_1m() -> Self {
        StreamType::Kline("1m".to_string())
    }

    /// Get the Binance stream suffix for this stream type
    pub fn binance_suffix(&self) -> String {
        match self {
            StreamType::Kline(interval) => format!("kline_{}", interval),
            StreamType::Trade => "trade".to_string(),
        }
    }

    /// Check if this stream type is currently implemented
    pub fn is_implemented(&self) -> bool {
        matches!(self, StreamType::Kline(_))
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamType::Kline(interval) => write!(f, "kline_{}", interval),
            StreamType::Trade => write!(f, "trade"),
        }
    }
}

/// WebSocket connection status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed { error: String },
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting"),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Reconnecting { attempt } => write!(f, "Reconnecting (attempt {})", attempt),
            ConnectionStatus::Failed { error } => write!(f, "Failed: {}", error),
        }
    }
}

/// Stream subscription information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSubscription {
    pub stream_type: StreamType,
    pub symbols: Vec<String>,
}

impl StreamSubscription {
    pub fn new(stream_type: StreamType, symbols: Vec<String>) -> Self {
        Self { stream_type, symbols }
    }

    /// Generate Binance WebSocket stream names for this subscription
    pub fn binance_streams(&self) -> Vec<String> {
        self.symbols
            .iter()
            .map(|symbol| format!("{}@{}", symbol.to_lowercase(), self.stream_type.binance_suffix()))
            .collect()
    }
}

/// WebSocket error types
#[derive(Error, Debug, Clone)]
pub enum WebSocketError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Stream type not implemented: {0}")]
    NotImplemented(StreamType),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Timeout error: {0}")]
    Timeout(String),
}

impl WebSocketError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WebSocketError::Connection(_) | WebSocketError::Timeout(_))
    }
}

/// Trait for parsing WebSocket messages into structured data
pub trait WebSocketMessage {
    type Output;

    /// Parse a raw WebSocket message into structured data
    fn parse(payload: &str) -> Result<Self::Output, WebSocketError>;

    /// Get the stream type this message belongs to
    fn stream_type() -> StreamType;
}

/// Connection statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub messages_received: u64,
    pub messages_parsed: u64,
    pub parse_errors: u64,
    pub connection_count: u32,
    pub last_message_time: Option<i64>,
    pub connection_established_time: Option<i64>,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message(&mut self) {
        self.messages_received += 1;
        self.last_message_time = Some(chrono::Utc::now().timestamp_millis());
    }

    pub fn record_parsed(&mut self) {
        self.messages_parsed += 1;
    }

    pub fn record_parse_error(&mut self) {
        self.parse_errors += 1;
    }

    pub fn record_connection(&mut self) {
        self.connection_count += 1;
        self.connection_established_time = Some(chrono::Utc::now().timestamp_millis());
    }

    pub fn parse_success_rate(&self) -> f64 {
        if self.messages_received == 0 {
            0.0
        } else {
            self.messages_parsed as f64 / self.messages_received as f64
        }
    }
}
