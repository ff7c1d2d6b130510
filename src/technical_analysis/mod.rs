pub mod actor;
pub mod indicators;
pub mod signals;
pub mod structs;

// Re-export commonly used types for convenience
pub use actor::{IndicatorActor, IndicatorAsk, IndicatorReply, IndicatorTell};
pub use structs::{
    AnalysisConfig, IndicatorSnapshot, RiskBasis, SignalType, TradingParameters, TradingSignal,
};
