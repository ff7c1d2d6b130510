use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::websocket::types::{
    ConnectionStats, ConnectionStatus, StreamSubscription, WebSocketError,
};

/// Connection manager for WebSocket streams.
///
/// Reconnection policy is explicit state: attempt count and a bounded delay
/// live here, not in timers recreated inside callbacks. The attempt counter
/// resets after every successful connection.
#[derive(Clone)]
pub struct ConnectionManager {
    base_url: String,
    stats: ConnectionStats,
    status: ConnectionStatus,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
}

impl ConnectionManager {
    /// Create a new connection manager for Binance spot
    pub fn new_binance_spot() -> Self {
        Self::new("wss://stream.binance.com:9443".to_string())
    }

    /// Create a new connection manager with a custom endpoint
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            stats: ConnectionStats::new(),
            status: ConnectionStatus::Disconnected,
            max_reconnect_attempts: 10,
            reconnect_delay: Duration::from_secs(5),
        }
    }

    /// Get current connection status
    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// Get connection statistics
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Build WebSocket URL for a single stream subscription
    pub fn build_single_stream_url(&self, subscription: &StreamSubscription) -> Result<String, WebSocketError> {
        if subscription.symbols.len() != 1 {
            return Err(WebSocketError::Subscription(
                "Single stream URL requires exactly one symbol".to_string(),
            ));
        }

        let symbol = &subscription.symbols[0];
        let stream = format!("{}@{}", symbol.to_lowercase(), subscription.stream_type.binance_suffix());
        Ok(format!("{}/ws/{}", self.base_url, stream))
    }

    /// Build WebSocket URL for a multi-stream subscription
    pub fn build_multi_stream_url(&self, subscriptions: &[StreamSubscription]) -> Result<String, WebSocketError> {
        if subscriptions.is_empty() {
            return Err(WebSocketError::Subscription(
                "At least one subscription required".to_string(),
            ));
        }

        let mut all_streams = Vec::new();
        for subscription in subscriptions {
            all_streams.extend(subscription.binance_streams());
        }

        if all_streams.is_empty() {
            return Err(WebSocketError::Subscription(
                "No valid streams found in subscriptions".to_string(),
            ));
        }

        Ok(format!("{}/stream?streams={}", self.base_url, all_streams.join("/")))
    }

    /// Connect with automatic reconnection, invoking `on_reconnect` after
    /// every re-established connection so the caller can bridge any gap.
    pub async fn connect_with_retry<F, Fut, C>(
        &mut self,
        url: &str,
        mut message_handler: F,
        on_reconnect: C,
    ) -> Result<(), WebSocketError>
    where
        F: FnMut(String) -> Fut,
        Fut: std::future::Future<Output = Result<(), WebSocketError>>,
        C: Fn(bool),
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.status = if attempt == 1 {
                ConnectionStatus::Connecting
            } else {
                ConnectionStatus::Reconnecting { attempt }
            };

            match self.connect_once(url, &mut message_handler).await {
                Ok(_) => {
                    info!("WebSocket connection completed normally");
                    on_reconnect(attempt > 1);
                    // Reset attempt counter on successful connection
                    attempt = 0;
                }
                Err(e) => {
                    if attempt >= self.max_reconnect_attempts {
                        let error = format!(
                            "Max reconnection attempts ({}) exceeded: {}",
                            self.max_reconnect_attempts, e
                        );
                        self.status = ConnectionStatus::Failed { error: error.clone() };
                        return Err(WebSocketError::Connection(error));
                    }

                    warn!(
                        "WebSocket connection failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempt, self.max_reconnect_attempts, e, self.reconnect_delay
                    );

                    sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    /// Single connection attempt: connect, then pump messages until the
    /// stream ends.
    async fn connect_once<F, Fut>(
        &mut self,
        url: &str,
        message_handler: &mut F,
    ) -> Result<(), WebSocketError>
    where
        F: FnMut(String) -> Fut,
        Fut: std::future::Future<Output = Result<(), WebSocketError>>,
    {
        info!("Connecting to WebSocket: {}", url);

        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| WebSocketError::Connection(format!("Connect failed: {}", e)))?;

        let (mut write, mut read) = ws_stream.split();

        self.status = ConnectionStatus::Connected;
        self.stats.record_connection();
        info!("✅ WebSocket connected");

        let result = loop {
            let Some(frame) = read.next().await else {
                info!("WebSocket stream ended");
                break Ok(());
            };

            match frame {
                Ok(WsMessage::Text(text)) => {
                    self.stats.record_message();
                    debug!("Received WebSocket message ({}b)", text.len());

                    match message_handler(text).await {
                        Ok(_) => self.stats.record_parsed(),
                        Err(e) => {
                            self.stats.record_parse_error();
                            warn!("Failed to handle message: {}", e);
                        }
                    }
                }
                Ok(WsMessage::Ping(payload)) => {
                    debug!("Received WebSocket ping, sending pong");
                    if let Err(e) = write.send(WsMessage::Pong(payload)).await {
                        warn!("Failed to send pong: {}", e);
                    }
                }
                Ok(WsMessage::Pong(_)) => {
                    debug!("Received WebSocket pong");
                }
                Ok(WsMessage::Close(_)) => {
                    info!("WebSocket closed by server");
                    break Ok(());
                }
                Ok(_) => {
                    warn!("Received unexpected binary/frame message");
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break Err(WebSocketError::Connection(format!("WebSocket error: {}", e)));
                }
            }
        };

        self.status = ConnectionStatus::Disconnected;
        info!("WebSocket disconnected");

        result
    }

    /// Set maximum reconnection attempts
    pub fn set_max_reconnect_attempts(&mut self, attempts: u32) {
        self.max_reconnect_attempts = attempts;
    }

    /// Set reconnection delay
    pub fn set_reconnect_delay(&mut self, delay: Duration) {
        self.reconnect_delay = delay;
    }

    /// Check if the connection is healthy based on recent message activity
    pub fn is_healthy(&self, max_idle_time: Duration) -> bool {
        match &self.status {
            ConnectionStatus::Connected => {
                let now_ms = chrono::Utc::now().timestamp_millis();

                if let Some(last_message_time) = self.stats.last_message_time {
                    let idle = Duration::from_millis((now_ms - last_message_time).max(0) as u64);
                    return idle <= max_idle_time;
                }

                // No messages yet: healthy while inside the startup grace window.
                if let Some(connection_time) = self.stats.connection_established_time {
                    let age = Duration::from_millis((now_ms - connection_time).max(0) as u64);
                    return age <= max_idle_time;
                }

                false
            }
            _ => false,
        }
    }
}

/// Utility function to validate symbol format
pub fn validate_symbol(symbol: &str) -> Result<(), WebSocketError> {
    if symbol.is_empty() {
        return Err(WebSocketError::InvalidSymbol("Symbol cannot be empty".to_string()));
    }

    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(WebSocketError::InvalidSymbol(
            format!("Symbol '{}' contains invalid characters", symbol),
        ));
    }

    Ok(())
}

/// Utility function to validate and normalize symbols
pub fn normalize_symbols(symbols: &[String]) -> Result<Vec<String>, WebSocketError> {
    let mut normalized = Vec::new();

    for symbol in symbols {
        validate_symbol(symbol)?;
        normalized.push(symbol.to_uppercase());
    }

    Ok(normalized)
}
