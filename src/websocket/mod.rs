pub mod actor;
pub mod binance;
pub mod connection;
pub mod types;

pub use actor::{WebSocketActor, WebSocketAsk, WebSocketReply, WebSocketTell};
pub use binance::kline::{BinanceKlineData, BinanceKlineEvent};
pub use connection::ConnectionManager;
pub use types::{ConnectionStatus, StreamType, WebSocketError};
