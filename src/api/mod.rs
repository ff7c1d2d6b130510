pub mod binance;
pub mod types;

pub use binance::BinanceKlinesClient;
pub use types::{ApiConfig, ApiError, ApiRequest, ApiStats, RateLimitInfo};
