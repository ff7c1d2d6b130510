use tracing::warn;

use crate::api::types::{ApiError, ApiRequest};
use crate::historical::fetcher::KlineSource;
use crate::historical::structs::Candle;
use crate::historical::utils::interval_to_seconds;

/// Deterministic kline generator used as an optional fallback when the real
/// source is unavailable.
///
/// Responses produced here must never be mistaken for exchange data: the
/// caller tags everything seeded from this source with
/// [`DataOrigin::Synthetic`](crate::historical::structs::DataOrigin) and the
/// HTTP layer surfaces that tag to consumers.
#[derive(Debug, Clone)]
pub struct SyntheticKlineSource {
    base_price: f64,
    amplitude: f64,
}

impl SyntheticKlineSource {
    pub fn new(base_price: f64) -> Self {
        Self { base_price, amplitude: base_price * 0.01 }
    }

    fn price_at(&self, step: i64) -> f64 {
        // Slow sine swing plus a small deterministic ripple. Same timestamp
        // always yields the same candle.
        let t = step as f64;
        self.base_price + self.amplitude * (t / 20.0).sin() + (self.amplitude * 0.1) * (t / 3.0).cos()
    }
}

impl KlineSource for SyntheticKlineSource {
    async fn fetch_page(&mut self, request: &ApiRequest) -> Result<Vec<Candle>, ApiError> {
        let interval_ms = interval_to_seconds(&request.interval)
            .map_err(|e| ApiError::Parse(e.to_string()))? as i64
            * 1000;
        let start = request.start_time.unwrap_or(0);
        let end = request.end_time.unwrap_or(start + interval_ms);
        let limit = request.limit.unwrap_or(1000) as i64;

        warn!(
            "Serving SYNTHETIC klines for {} {} ({} - {})",
            request.symbol, request.interval, start, end
        );

        let mut candles = Vec::new();
        let first_bucket = (start + interval_ms - 1) / interval_ms * interval_ms;
        let mut open_time = first_bucket;
        while open_time <= end && (candles.len() as i64) < limit {
            let step = open_time / interval_ms;
            let open = self.price_at(step);
            let close = self.price_at(step + 1);
            let high = open.max(close) * 1.001;
            let low = open.min(close) * 0.999;
            let volume = 10.0 + (step % 7) as f64;
            candles.push(Candle::new_from_values(open_time, open, high, low, close, volume, true));
            open_time += interval_ms;
        }

        Ok(candles)
    }
}
