use serde::{Deserialize, Serialize};

pub type TimestampMS = i64;
pub type Seconds = u64;

/// One fixed-interval OHLCV candlestick bucket.
///
/// `open_time` is the bucket start aligned to the interval boundary.
/// `closed == false` marks the single live bucket that later ticks may
/// still mutate; the buffer guarantees at most one such candle and that it
/// is the last by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: TimestampMS,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub closed: bool,
}

impl Candle {
    pub fn new_from_values(
        open_time: TimestampMS,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        closed: bool,
    ) -> Self {
        Self { open_time, open, high, low, close, volume, closed }
    }

    pub fn open_time(&self) -> TimestampMS {
        self.open_time
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    /// Price ordering invariant: `low <= min(open, close) <= max(open, close) <= high`.
    pub fn is_price_ordered(&self) -> bool {
        self.low <= self.open.min(self.close) && self.high >= self.open.max(self.close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: TimestampMS,
    pub end: TimestampMS,
}

/// Where a batch of candles came from. Synthetic data must stay
/// distinguishable from exchange data all the way to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    Exchange,
    Synthetic,
}

/// One live update from the tick stream.
///
/// Binance kline fragments carry the full running state of the current
/// bucket (cumulative volume included); plain trades carry a single price
/// and an incremental size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TickUpdate {
    Trade {
        timestamp: TimestampMS,
        price: f64,
        volume: f64,
    },
    Fragment(Candle),
}

impl TickUpdate {
    pub fn timestamp(&self) -> TimestampMS {
        match self {
            TickUpdate::Trade { timestamp, .. } => *timestamp,
            TickUpdate::Fragment(candle) => candle.open_time,
        }
    }
}
