use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::historical::structs::TimestampMS;

/// API request configuration for a kline page.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub symbol: String,
    pub interval: String,
    pub start_time: Option<TimestampMS>,
    pub end_time: Option<TimestampMS>,
    pub limit: Option<u32>,
}

impl ApiRequest {
    pub fn new_klines(symbol: String, interval: String) -> Self {
        Self {
            symbol,
            interval,
            start_time: None,
            end_time: None,
            limit: None,
        }
    }

    pub fn with_time_range(mut self, start_time: TimestampMS, end_time: TimestampMS) -> Self {
        self.start_time = Some(start_time);
        self.end_time = Some(end_time);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// API response wrapper
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub data: T,
    pub rate_limit_info: Option<RateLimitInfo>,
}

/// Rate limiting information from API headers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub requests_used: u32,
    pub requests_limit: u32,
    pub retry_after: Option<u32>,
}

/// API error types
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimit { retry_after_secs: u64 },

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout error: {0}")]
    Timeout(String),
}

impl ApiError {
    /// Transient failures the transport layer retries with backoff.
    /// Parse failures mean the payload shape is wrong and retrying cannot help.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout(_) | ApiError::Http(_))
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ApiError::RateLimit { .. })
    }
}

/// API statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiStats {
    pub requests_made: u64,
    pub requests_successful: u64,
    pub requests_failed: u64,
    pub rate_limit_hits: u64,
    pub total_candles_fetched: u64,
}

impl ApiStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&mut self) {
        self.requests_made += 1;
    }

    pub fn record_success(&mut self, candles_count: u64) {
        self.requests_successful += 1;
        self.total_candles_fetched += candles_count;
    }

    pub fn record_failure(&mut self) {
        self.requests_failed += 1;
    }

    pub fn record_rate_limit(&mut self) {
        self.rate_limit_hits += 1;
        self.record_failure();
    }

    pub fn success_rate(&self) -> f64 {
        if self.requests_made == 0 {
            0.0
        } else {
            self.requests_successful as f64 / self.requests_made as f64
        }
    }
}

/// Configuration for the REST client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl ApiConfig {
    /// Binance spot API configuration
    pub fn binance_spot() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::binance_spot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_request_builder() {
        let request = ApiRequest::new_klines("BTCUSDT".to_string(), "1m".to_string())
            .with_time_range(1000, 2000)
            .with_limit(500);

        assert_eq!(request.start_time, Some(1000));
        assert_eq!(request.end_time, Some(2000));
        assert_eq!(request.limit, Some(500));
    }

    #[test]
    fn test_error_classification() {
        assert!(ApiError::Network("conn reset".to_string()).is_recoverable());
        assert!(ApiError::Timeout("30s".to_string()).is_recoverable());
        assert!(!ApiError::Parse("bad json".to_string()).is_recoverable());
        assert!(ApiError::RateLimit { retry_after_secs: 60 }.is_rate_limit());
        assert!(!ApiError::RateLimit { retry_after_secs: 60 }.is_recoverable());
    }

    #[test]
    fn test_api_stats_success_rate() {
        let mut stats = ApiStats::new();
        assert_eq!(stats.success_rate(), 0.0);

        stats.record_request();
        stats.record_success(1000);
        stats.record_request();
        stats.record_failure();
        assert_eq!(stats.success_rate(), 0.5);
        assert_eq!(stats.total_candles_fetched, 1000);
    }
}
