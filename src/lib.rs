pub mod api;
pub mod common;
pub mod historical;
pub mod logging;
pub mod reconciler;
pub mod server;
pub mod technical_analysis;
pub mod websocket;
