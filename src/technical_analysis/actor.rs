use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::{ActorStopReason, BoxError};
use kameo::message::{Context, Message};
use kameo::{Actor, mailbox::unbounded::UnboundedMailbox};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common::constants::SIGNAL_LOOKBACK_BARS;
use crate::historical::structs::{Candle, DataOrigin};
use crate::technical_analysis::indicators::{atr, ema, rsi, sma, trend_strength};
use crate::technical_analysis::signals::generate_signals;
use crate::technical_analysis::structs::{AnalysisConfig, IndicatorSnapshot, TradingSignal};

/// Indicator actor messages for telling (fire-and-forget)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndicatorTell {
    /// Recompute indicators and signals from a fresh buffer snapshot
    ProcessSnapshot {
        symbol: String,
        candles: Vec<Candle>,
        origin: DataOrigin,
    },
}

/// Indicator actor messages for asking (request-response)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndicatorAsk {
    /// Get the latest indicator values for a symbol
    GetIndicators { symbol: String },
    /// Get the latest scored signals for a symbol
    GetSignals { symbol: String },
}

/// Indicator actor replies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndicatorReply {
    Indicators(Box<IndicatorSnapshot>),
    Signals {
        signals: Vec<TradingSignal>,
        origin: DataOrigin,
    },
    Error(String),
}

/// Per-symbol analysis result cache.
#[derive(Debug, Clone)]
struct SymbolAnalysisState {
    indicators: IndicatorSnapshot,
    signals: Vec<TradingSignal>,
    origin: DataOrigin,
}

/// Actor recomputing the full derived view on every buffer change.
///
/// The recompute is whole-series rather than incremental; the buffer is
/// capacity-bounded, so each pass stays cheap and the derived state can
/// never drift from the authoritative candles.
pub struct IndicatorActor {
    config: AnalysisConfig,
    symbol_states: FxHashMap<String, SymbolAnalysisState>,
    recompute_count: u64,
}

impl IndicatorActor {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            symbol_states: FxHashMap::default(),
            recompute_count: 0,
        }
    }

    fn process_snapshot(&mut self, symbol: String, candles: Vec<Candle>, origin: DataOrigin) {
        let params = &self.config.parameters;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let last_some = |series: Vec<Option<f64>>| series.into_iter().rev().flatten().next();

        let trend_window_start = closes.len().saturating_sub(SIGNAL_LOOKBACK_BARS);
        let indicators = IndicatorSnapshot {
            symbol: symbol.clone(),
            timestamp: candles.last().map(|c| c.open_time).unwrap_or(0),
            close: closes.last().copied(),
            sma: last_some(sma(&closes, params.sma_length)),
            ema: last_some(ema(&closes, params.ema_length)),
            rsi: last_some(rsi(&closes, params.rsi_length)),
            atr: last_some(atr(&candles, crate::common::constants::RISK_ATR_PERIOD)),
            trend_strength: trend_strength(&closes[trend_window_start..]),
            origin,
        };

        let signals = generate_signals(&candles, params, self.config.risk_basis);
        self.recompute_count += 1;

        debug!(
            "Recomputed {} indicators from {} candles: {} signals, rsi={:?}",
            symbol, candles.len(), signals.len(), indicators.rsi
        );

        self.symbol_states.insert(symbol, SymbolAnalysisState { indicators, signals, origin });
    }
}

impl Actor for IndicatorActor {
    type Mailbox = UnboundedMailbox<Self>;

    fn name() -> &'static str {
        "IndicatorActor"
    }

    async fn on_start(&mut self, _actor_ref: ActorRef<Self>) -> Result<(), BoxError> {
        info!(
            "🚀 Starting Indicator Actor (sma={}, ema={}, rsi={}, risk_basis={:?})",
            self.config.parameters.sma_length,
            self.config.parameters.ema_length,
            self.config.parameters.rsi_length,
            self.config.risk_basis
        );
        Ok(())
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        _reason: ActorStopReason,
    ) -> Result<(), BoxError> {
        info!(
            "🛑 Stopping Indicator Actor after {} recomputes across {} symbols",
            self.recompute_count,
            self.symbol_states.len()
        );
        Ok(())
    }
}

impl Message<IndicatorTell> for IndicatorActor {
    type Reply = ();

    async fn handle(&mut self, msg: IndicatorTell, _ctx: Context<'_, Self, Self::Reply>) -> Self::Reply {
        match msg {
            IndicatorTell::ProcessSnapshot { symbol, candles, origin } => {
                self.process_snapshot(symbol, candles, origin);
            }
        }
    }
}

impl Message<IndicatorAsk> for IndicatorActor {
    type Reply = Result<IndicatorReply, String>;

    async fn handle(&mut self, msg: IndicatorAsk, _ctx: Context<'_, Self, Self::Reply>) -> Self::Reply {
        match msg {
            IndicatorAsk::GetIndicators { symbol } => match self.symbol_states.get(&symbol) {
                Some(state) => Ok(IndicatorReply::Indicators(Box::new(state.indicators.clone()))),
                None => Ok(IndicatorReply::Indicators(Box::new(IndicatorSnapshot::empty(&symbol)))),
            },
            IndicatorAsk::GetSignals { symbol } => match self.symbol_states.get(&symbol) {
                Some(state) => Ok(IndicatorReply::Signals {
                    signals: state.signals.clone(),
                    origin: state.origin,
                }),
                None => Ok(IndicatorReply::Signals {
                    signals: Vec::new(),
                    origin: DataOrigin::Exchange,
                }),
            },
        }
    }
}
