pub mod kline;

pub use kline::{parse_any_kline_message, BinanceKlineData, BinanceKlineEvent};
