use serde::{Deserialize, Serialize};

use crate::historical::structs::{DataOrigin, TimestampMS};

/// Strategy parameters for one analysis pass. Immutable once supplied;
/// every generator call takes them explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingParameters {
    pub sma_length: usize,
    pub ema_length: usize,
    pub rsi_length: usize,
    pub macd_short: usize,
    pub macd_long: usize,
    pub macd_signal: usize,
    pub bollinger_length: usize,
    pub bollinger_mult: f64,
    pub forecast_length: usize,
    pub risk_percentage: f64,
}

impl Default for TradingParameters {
    fn default() -> Self {
        Self {
            sma_length: 200,
            ema_length: 50,
            rsi_length: 14,
            macd_short: 12,
            macd_long: 26,
            macd_signal: 9,
            bollinger_length: 20,
            bollinger_mult: 2.0,
            forecast_length: 10,
            risk_percentage: 2.0,
        }
    }
}

/// Which quantity the risk percentage scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBasis {
    /// `risk = ATR(14) * risk_percentage` — volatility-scaled risk.
    Atr,
    /// `risk = price * risk_percentage / 100` — fraction of current price.
    Price,
}

impl Default for RiskBasis {
    fn default() -> Self {
        RiskBasis::Atr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalType::Buy => write!(f, "BUY"),
            SignalType::Sell => write!(f, "SELL"),
        }
    }
}

/// One scored trading signal. Produced fresh on every recomputation and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub timestamp: TimestampMS,
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub price: f64,
    /// Estimated success probability in `[0, 100]`.
    pub probability: f64,
    /// Risk estimate, `>= 0`, per the configured [`RiskBasis`].
    pub risk: f64,
}

/// Latest indicator values for one instrument, regenerated on every buffer
/// change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub timestamp: TimestampMS,
    pub close: Option<f64>,
    pub sma: Option<f64>,
    pub ema: Option<f64>,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
    pub trend_strength: f64,
    pub origin: DataOrigin,
}

impl IndicatorSnapshot {
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp: 0,
            close: None,
            sma: None,
            ema: None,
            rsi: None,
            atr: None,
            trend_strength: 0.0,
            origin: DataOrigin::Exchange,
        }
    }
}

/// Configuration for the analysis pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub parameters: TradingParameters,
    pub risk_basis: RiskBasis,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            parameters: TradingParameters::default(),
            risk_basis: RiskBasis::default(),
        }
    }
}
