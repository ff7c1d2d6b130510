use chrono::{TimeZone, Utc};

use super::errors::HistoricalDataError;
use super::structs::{Candle, Seconds, TimeRange, TimestampMS};

// Convert Binance interval strings to Seconds
pub fn interval_to_seconds(interval: &str) -> Result<Seconds, HistoricalDataError> {
    match interval {
        "1m" => Ok(60),
        "3m" => Ok(180),
        "5m" => Ok(300),
        "15m" => Ok(900),
        "30m" => Ok(1800),
        "1h" => Ok(3600),
        "2h" => Ok(7200),
        "4h" => Ok(14400),
        "6h" => Ok(21600),
        "8h" => Ok(28800),
        "12h" => Ok(43200),
        "1d" => Ok(86400),
        _ => Err(HistoricalDataError::Validation(format!("Unsupported interval: {}", interval))),
    }
}

pub fn format_timestamp(timestamp_ms: TimestampMS) -> String {
    match Utc.timestamp_millis_opt(timestamp_ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("INVALID_TIME({})", timestamp_ms),
    }
}

/// Scan a sorted candle sequence for holes larger than one interval inside
/// `[start_time, end_time]`. Backfill output must come back empty here
/// before it is allowed to seed the buffer.
pub fn scan_for_candle_gaps(
    candles: &[Candle],
    timeframe: Seconds,
    start_time: TimestampMS,
    end_time: TimestampMS,
) -> Vec<TimeRange> {
    let mut gaps = Vec::new();
    if candles.is_empty() {
        if start_time < end_time {
            gaps.push(TimeRange { start: start_time, end: end_time });
        }
        return gaps;
    }

    let expected_interval_ms = timeframe as i64 * 1000;

    // Gap at the beginning
    if candles[0].open_time() >= start_time + expected_interval_ms {
        gaps.push(TimeRange { start: start_time, end: candles[0].open_time() });
    }

    // Gaps between candles
    for pair in candles.windows(2) {
        let expected_next_open_time = pair[0].open_time() + expected_interval_ms;
        if pair[1].open_time() > expected_next_open_time {
            gaps.push(TimeRange { start: expected_next_open_time, end: pair[1].open_time() });
        }
    }

    // Gap at the end
    let last_open = candles[candles.len() - 1].open_time();
    if last_open + expected_interval_ms < end_time {
        gaps.push(TimeRange { start: last_open + expected_interval_ms, end: end_time });
    }

    gaps
}
