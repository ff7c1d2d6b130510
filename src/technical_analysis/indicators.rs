//! Pure indicator functions over close-price (or full OHLC) series.
//!
//! No I/O, no state. Every series function returns a vector aligned
//! index-for-index with its input; indices inside the warm-up window hold
//! `None` and are never an error. Non-finite intermediate results are
//! normalized to defined sentinels before they can reach signal scoring.

use crate::historical::structs::Candle;

/// Simple moving average of the trailing `length` values.
/// Defined for indices `>= length - 1`.
pub fn sma(data: &[f64], length: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if length == 0 || data.len() < length {
        return out;
    }

    let mut window_sum: f64 = data[..length].iter().sum();
    out[length - 1] = Some(window_sum / length as f64);
    for i in length..data.len() {
        window_sum += data[i] - data[i - length];
        out[i] = Some(window_sum / length as f64);
    }
    out
}

/// Exponential moving average, seeded at index `length - 1` with the SMA of
/// the first `length` values, then
/// `ema[i] = (price[i] - ema[i-1]) * (2 / (length + 1)) + ema[i-1]`.
pub fn ema(data: &[f64], length: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if length == 0 || data.len() < length {
        return out;
    }

    let multiplier = 2.0 / (length as f64 + 1.0);
    let seed: f64 = data[..length].iter().sum::<f64>() / length as f64;
    out[length - 1] = Some(seed);

    let mut prev = seed;
    for i in length..data.len() {
        let value = (data[i] - prev) * multiplier + prev;
        out[i] = Some(value);
        prev = value;
    }
    out
}

/// Relative Strength Index with Wilder smoothing.
///
/// Average gain/loss are seeded as the simple mean of the first `length`
/// per-step changes, then smoothed with
/// `avg = (avg * (length - 1) + current) / length`. A window with zero
/// average loss is defined as RSI 100; the division is never allowed to
/// produce a non-finite value.
pub fn rsi(data: &[f64], length: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if length == 0 || data.len() <= length {
        return out;
    }

    let changes: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = changes[..length]
        .iter()
        .map(|&c| if c > 0.0 { c } else { 0.0 })
        .sum::<f64>()
        / length as f64;
    let mut avg_loss = changes[..length]
        .iter()
        .map(|&c| if c < 0.0 { -c } else { 0.0 })
        .sum::<f64>()
        / length as f64;

    out[length] = Some(rsi_value(avg_gain, avg_loss));

    for i in (length + 1)..data.len() {
        let change = changes[i - 1];
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        avg_gain = (avg_gain * (length as f64 - 1.0) + gain) / length as f64;
        avg_loss = (avg_loss * (length as f64 - 1.0) + loss) / length as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Per-bar true range: `max(high - low, |high - prev_close|, |low - prev_close|)`.
/// The first bar has no previous close and uses `high - low`.
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            if i == 0 {
                candle.high - candle.low
            } else {
                let prev_close = candles[i - 1].close;
                (candle.high - candle.low)
                    .max((candle.high - prev_close).abs())
                    .max((candle.low - prev_close).abs())
            }
        })
        .collect()
}

/// Average True Range: mean of the trailing `length` true ranges.
/// Defined for indices `>= length - 1`.
pub fn atr(candles: &[Candle], length: usize) -> Vec<Option<f64>> {
    let ranges = true_ranges(candles);
    sma(&ranges, length)
}

/// ATR evaluated over up to `length` bars ending at `index`, using a
/// shorter window when the series has less history.
pub fn atr_at(candles: &[Candle], index: usize, length: usize) -> Option<f64> {
    if index >= candles.len() || length == 0 {
        return None;
    }
    let ranges = true_ranges(&candles[..=index]);
    let window = length.min(ranges.len());
    let sum: f64 = ranges[ranges.len() - window..].iter().sum();
    Some(sum / window as f64)
}

/// Trend strength: `|R²|` of an ordinary-least-squares regression of close
/// price against bar index, clamped to `[0, 1]`. A flat window has no
/// trend to measure and yields 0, not NaN.
pub fn trend_strength(closes: &[f64]) -> f64 {
    if closes.len() < 2 {
        return 0.0;
    }

    let n = closes.len() as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    for (i, &y) in closes.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denom = n * sum_xx - sum_x * sum_x;
    if denom == 0.0 {
        return 0.0;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;

    let y_mean = sum_y / n;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (i, &y) in closes.iter().enumerate() {
        let predicted = slope * i as f64 + intercept;
        ss_res += (y - predicted) * (y - predicted);
        ss_tot += (y - y_mean) * (y - y_mean);
    }

    if ss_tot == 0.0 {
        return 0.0;
    }

    let r2 = 1.0 - ss_res / ss_tot;
    r2.abs().clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(high: f64, low: f64, close: f64) -> Candle {
        Candle::new_from_values(0, close, high, low, close, 1.0, true)
    }

    #[test]
    fn test_sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_eq!(result[2], Some(2.0));
        assert_eq!(result[3], Some(3.0));
        assert_eq!(result[4], Some(4.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        assert_eq!(sma(&[1.0, 2.0], 5), vec![None, None]);
        assert!(sma(&[], 5).is_empty());
    }

    #[test]
    fn test_ema_seed_equals_sma() {
        // EMA(n)[n-1] must equal SMA(n) exactly.
        let data = vec![10.0, 12.0, 14.0, 16.0, 18.0, 20.0];
        let n = 4;
        let ema_series = ema(&data, n);
        let sma_series = sma(&data, n);
        assert_eq!(ema_series[n - 1], sma_series[n - 1]);
        assert_eq!(ema_series[n - 1], Some(13.0));
    }

    #[test]
    fn test_ema_recurrence() {
        let data = vec![10.0, 12.0, 14.0, 16.0];
        let result = ema(&data, 3);
        // Seed at index 2: (10 + 12 + 14) / 3 = 12.
        assert_eq!(result[2], Some(12.0));
        // Next: (16 - 12) * 0.5 + 12 = 14.
        assert_eq!(result[3], Some(14.0));
    }

    #[test]
    fn test_ema_tracks_rising_prices() {
        let data: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let result = ema(&data, 5);
        let defined: Vec<f64> = result.into_iter().flatten().collect();
        for pair in defined.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_rsi_bounds() {
        let data = vec![44.0, 44.3, 44.1, 43.6, 44.3, 44.8, 45.1, 45.4, 45.8, 46.1,
                        45.9, 46.0, 45.7, 46.2, 46.3, 46.0, 46.4, 46.2, 45.6, 46.2];
        let result = rsi(&data, 14);
        for value in result.iter().flatten() {
            assert!((0.0..=100.0).contains(value), "RSI out of bounds: {}", value);
            assert!(value.is_finite());
        }
        // Warm-up: nothing defined before index `length`.
        for value in &result[..14] {
            assert!(value.is_none());
        }
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        // No losses in the window: RSI is pinned to 100, not NaN.
        let data: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let result = rsi(&data, 14);
        for value in result.iter().flatten() {
            assert_eq!(*value, 100.0);
        }
    }

    #[test]
    fn test_rsi_monotonic_rise_stays_above_50() {
        // Strictly increasing closes never pull RSI below 50 after warm-up.
        let data: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64).sqrt() * 3.0).collect();
        let result = rsi(&data, 14);
        for value in result.iter().flatten() {
            assert!(*value >= 50.0, "RSI dipped below 50 on a rising series: {}", value);
        }
    }

    #[test]
    fn test_rsi_flat_series_is_100() {
        // Zero average loss (and zero gain) resolves to the no-losses sentinel.
        let data = vec![50.0; 20];
        let result = rsi(&data, 14);
        assert_eq!(result[14], Some(100.0));
    }

    #[test]
    fn test_true_ranges_uses_prev_close() {
        let candles = vec![
            candle(105.0, 95.0, 100.0),
            // Gapped up: high - prev_close dominates.
            candle(120.0, 110.0, 115.0),
        ];
        let ranges = true_ranges(&candles);
        assert_eq!(ranges[0], 10.0);
        assert_eq!(ranges[1], 20.0);
    }

    #[test]
    fn test_atr_warm_up() {
        let candles: Vec<Candle> = (0..10).map(|_| candle(101.0, 99.0, 100.0)).collect();
        let result = atr(&candles, 5);
        assert_eq!(result[3], None);
        assert_eq!(result[4], Some(2.0));
        assert_eq!(result[9], Some(2.0));
    }

    #[test]
    fn test_atr_at_partial_window() {
        let candles: Vec<Candle> = (0..5).map(|_| candle(101.0, 99.0, 100.0)).collect();
        // Only 3 bars of history at index 2; the window shrinks.
        assert_eq!(atr_at(&candles, 2, 14), Some(2.0));
        assert_eq!(atr_at(&candles, 10, 14), None);
    }

    #[test]
    fn test_trend_strength_perfect_line() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + 2.0 * i as f64).collect();
        let strength = trend_strength(&closes);
        assert!((strength - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_strength_flat_window_is_zero() {
        // Zero variance must yield 0, not NaN.
        let closes = vec![10.0; 50];
        let strength = trend_strength(&closes);
        assert_eq!(strength, 0.0);
    }

    #[test]
    fn test_trend_strength_clamped() {
        let closes = vec![100.0, 103.0, 99.0, 104.0, 98.0, 105.0];
        let strength = trend_strength(&closes);
        assert!((0.0..=1.0).contains(&strength));
    }
}
