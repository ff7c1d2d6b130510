pub mod klines;

pub use klines::BinanceKlinesClient;
