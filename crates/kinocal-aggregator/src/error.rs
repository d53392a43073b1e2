//! Aggregator error types.

use thiserror::Error;

/// Result type for aggregator operations.
pub type AggregatorResult<T> = Result<T, AggregatorError>;

/// Errors raised while assembling the source list.
///
/// Source failures during a run are never errors; they end up in the
/// [`RunReport`](crate::RunReport).
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// Two sources registered under the same cinema name.
    #[error("Cinema {cinema:?} is already registered")]
    DuplicateCinema { cinema: String },

    /// A cinema name that is empty or whitespace.
    #[error("Cinema name must not be empty")]
    EmptyCinema,
}

impl AggregatorError {
    /// Creates a duplicate cinema error.
    pub fn duplicate_cinema(cinema: impl Into<String>) -> Self {
        Self::DuplicateCinema {
            cinema: cinema.into(),
        }
    }
}
