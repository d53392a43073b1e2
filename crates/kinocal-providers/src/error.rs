//! Error types for showing provider operations.
//!
//! [`ProviderError`] is the only error that crosses the adapter boundary. It
//! represents a failure of a whole source for a run; record-level problems are
//! [`NormalizeError`]s, which are logged and dropped inside the adapter.

use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Missing or malformed adapter configuration (e.g. no access token).
    ConfigurationError,
    /// The upstream rejected the configured credential.
    AuthenticationFailed,
    /// Connection failed, DNS resolution failed, etc.
    NetworkError,
    /// The request did not complete in time.
    Timeout,
    /// Too many requests.
    RateLimited,
    /// Upstream returned a 5xx status.
    ServerError,
    /// Resource not found (404).
    NotFound,
    /// Upstream rejected the request (400).
    BadRequest,
    /// The payload as a whole could not be understood.
    InvalidResponse,
    /// The daily cache could not be used.
    CacheError,
    /// Unexpected internal state.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::Timeout | Self::RateLimited | Self::ServerError
        )
    }

    /// Returns true if the source cannot work until its configuration is fixed.
    ///
    /// An invalid credential counts: retrying with the same token is pointless.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ConfigurationError | Self::AuthenticationFailed)
    }

    /// Returns a machine-friendly name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "configuration_error",
            Self::AuthenticationFailed => "authentication_failed",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::InvalidResponse => "invalid_response",
            Self::CacheError => "cache_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A source-level failure.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// The source that generated this error (e.g. "alamo").
    provider: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Timeout, message)
    }

    /// Creates a rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::BadRequest, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Creates a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::CacheError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Sets the provider name for this error.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Returns true if this is a configuration (or credential) problem.
    pub fn is_configuration(&self) -> bool {
        self.code.is_configuration()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_response(format!("unparseable JSON payload: {}", err)).with_source(err)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A single raw record that could not be turned into a showing.
///
/// These never abort a fetch: the adapter logs them with enough context to
/// find the record upstream and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("record {identity} has an empty title")]
    EmptyTitle { identity: String },

    #[error("record {identity} has no usable link")]
    MissingUrl { identity: String },

    #[error("record {identity} has an unresolvable link {url:?}")]
    InvalidUrl { identity: String, url: String },

    #[error("record {identity} has an unparseable date {raw:?}")]
    UnparseableDate { identity: String, raw: String },

    #[error("record {identity} on {date} references unknown {what}")]
    DanglingReference {
        identity: String,
        date: NaiveDate,
        what: String,
    },
}

impl NormalizeError {
    /// The upstream identifier of the offending record.
    pub fn identity(&self) -> &str {
        match self {
            Self::EmptyTitle { identity }
            | Self::MissingUrl { identity }
            | Self::InvalidUrl { identity, .. }
            | Self::UnparseableDate { identity, .. }
            | Self::DanglingReference { identity, .. } => identity,
        }
    }
}
