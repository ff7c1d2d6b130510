//! Signal generation and scoring over an immutable candle snapshot.
//!
//! `generate_signals` is a pure function of `(snapshot, parameters)`: the
//! same inputs always produce the same signals. No signal is emitted before
//! `sma_length` bars exist — the global warm-up gate.

use crate::common::constants::{RISK_ATR_PERIOD, SIGNAL_LOOKBACK_BARS};
use crate::historical::structs::Candle;
use crate::technical_analysis::indicators::{atr_at, ema, rsi, sma, trend_strength};
use crate::technical_analysis::structs::{RiskBasis, SignalType, TradingParameters, TradingSignal};

/// Evaluate the rule thresholds over the whole snapshot and return scored
/// signals in timestamp order.
pub fn generate_signals(
    candles: &[Candle],
    params: &TradingParameters,
    risk_basis: RiskBasis,
) -> Vec<TradingSignal> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let sma_series = sma(&closes, params.sma_length);
    let ema_series = ema(&closes, params.ema_length);
    let rsi_series = rsi(&closes, params.rsi_length);

    let mut signals = Vec::new();

    for i in params.sma_length..candles.len() {
        let (Some(sma_value), Some(ema_value), Some(rsi_value)) =
            (sma_series[i], ema_series[i], rsi_series[i])
        else {
            continue;
        };
        let price = closes[i];

        // The two conditions cannot hold at once under normal data, but they
        // are evaluated independently rather than special-cased.
        if price > sma_value && rsi_value < 70.0 && price > ema_value {
            signals.push(build_signal(candles, i, SignalType::Buy, params, risk_basis));
        }
        if price < sma_value && rsi_value > 30.0 && price < ema_value {
            signals.push(build_signal(candles, i, SignalType::Sell, params, risk_basis));
        }
    }

    signals
}

fn build_signal(
    candles: &[Candle],
    index: usize,
    signal_type: SignalType,
    params: &TradingParameters,
    risk_basis: RiskBasis,
) -> TradingSignal {
    TradingSignal {
        timestamp: candles[index].open_time,
        signal_type,
        price: candles[index].close,
        probability: signal_probability(candles, index, signal_type),
        risk: signal_risk(candles, index, params, risk_basis),
    }
}

/// Historical success probability for a signal at `index`, in `[0, 100]`.
///
/// Fraction of single-step moves over the trailing lookback window whose
/// direction matched the signal, scaled by `(1 + trend_strength)` and
/// damped by `(1 - 0.5 * normalized_volatility)`. Below the lookback the
/// evidence is insufficient and the probability is a neutral 50.
pub fn signal_probability(candles: &[Candle], index: usize, signal_type: SignalType) -> f64 {
    if index < SIGNAL_LOOKBACK_BARS {
        return 50.0;
    }

    let mut price_changes = Vec::with_capacity(SIGNAL_LOOKBACK_BARS);
    let mut successful_moves = 0usize;

    for i in (index - SIGNAL_LOOKBACK_BARS)..index {
        let change = (candles[i + 1].close - candles[i].close) / candles[i].close * 100.0;
        price_changes.push(change);

        let matched = match signal_type {
            SignalType::Buy => change > 0.0,
            SignalType::Sell => change < 0.0,
        };
        if matched {
            successful_moves += 1;
        }
    }

    let success_rate = successful_moves as f64 / SIGNAL_LOOKBACK_BARS as f64 * 100.0;
    let volatility = normalized_volatility(&price_changes);
    let window: Vec<f64> = candles[(index - SIGNAL_LOOKBACK_BARS)..index]
        .iter()
        .map(|c| c.close)
        .collect();
    let trend = trend_strength(&window);

    let mut probability = success_rate * (1.0 + trend) * (1.0 - 0.5 * volatility);
    if !probability.is_finite() {
        // A zero close in the window poisons the percentage changes; fall
        // back to the insufficient-evidence neutral.
        return 50.0;
    }
    probability = probability.clamp(0.0, 100.0);
    (probability * 100.0).round() / 100.0
}

/// Population standard deviation of the percentage changes, divided by 100.
fn normalized_volatility(price_changes: &[f64]) -> f64 {
    if price_changes.is_empty() {
        return 0.0;
    }
    let mean = price_changes.iter().sum::<f64>() / price_changes.len() as f64;
    let variance = price_changes
        .iter()
        .map(|c| (c - mean) * (c - mean))
        .sum::<f64>()
        / price_changes.len() as f64;
    variance.sqrt() / 100.0
}

fn signal_risk(
    candles: &[Candle],
    index: usize,
    params: &TradingParameters,
    risk_basis: RiskBasis,
) -> f64 {
    match risk_basis {
        RiskBasis::Atr => {
            atr_at(candles, index, RISK_ATR_PERIOD).unwrap_or(0.0) * params.risk_percentage
        }
        RiskBasis::Price => candles[index].close * (params.risk_percentage / 100.0),
    }
}
