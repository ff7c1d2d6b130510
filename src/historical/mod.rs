pub mod actor;
pub mod errors;
pub mod fetcher;
pub mod structs;
pub mod synthetic;
pub mod utils;

pub use actor::{HistoricalActor, HistoricalAsk, HistoricalReply};
pub use errors::HistoricalDataError;
pub use structs::{Candle, DataOrigin, Seconds, TickUpdate, TimeRange, TimestampMS};
