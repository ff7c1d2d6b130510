//! Shared constants for the data pipeline.

/// Maximum klines per REST page (Binance hard limit).
pub const KLINE_PAGE_LIMIT: u32 = 1000;

/// Maximum pages a single backfill is allowed to walk before the fetch is
/// treated as an upstream fault. 120 full pages of 1m candles is ~83 days,
/// far beyond anything the bounded buffer can hold.
pub const MAX_KLINE_PAGES: u32 = 120;

/// Default capacity of the per-instrument candle buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

/// Trailing window used to score signal probability.
pub const SIGNAL_LOOKBACK_BARS: usize = 20;

/// ATR window used for risk estimation.
pub const RISK_ATR_PERIOD: usize = 14;
