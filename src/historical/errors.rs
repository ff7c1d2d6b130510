use thiserror::Error;

use crate::api::types::ApiError;

#[derive(Error, Debug)]
pub enum HistoricalDataError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("Upstream data error: {0}")]
    UpstreamData(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("No data found: {0}")]
    NoData(String),
    #[error("Task join error: {0}")]
    TaskJoinError(tokio::task::JoinError),
}

impl From<tokio::task::JoinError> for HistoricalDataError {
    fn from(err: tokio::task::JoinError) -> Self {
        HistoricalDataError::TaskJoinError(err)
    }
}

impl HistoricalDataError {
    /// True when the failure class is worth retrying at the transport layer.
    /// Data-shape faults and validation failures are terminal.
    pub fn is_recoverable(&self) -> bool {
        match self {
            HistoricalDataError::Api(e) => e.is_recoverable() || e.is_rate_limit(),
            _ => false,
        }
    }
}
