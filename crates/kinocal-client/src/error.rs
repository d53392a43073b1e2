//! Client error types.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider or aggregator setup error.
    #[error("provider error: {0}")]
    Provider(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to render or write the calendar.
    #[error("output error: {0}")]
    Output(String),
}

impl From<kinocal_providers::ProviderError> for ClientError {
    fn from(err: kinocal_providers::ProviderError) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<kinocal_aggregator::AggregatorError> for ClientError {
    fn from(err: kinocal_aggregator::AggregatorError) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Output(err.to_string())
    }
}
