pub mod actor;
pub mod buffer;

pub use actor::{ReconcilerActor, ReconcilerAsk, ReconcilerReply, ReconcilerTell};
pub use buffer::CandleBuffer;
