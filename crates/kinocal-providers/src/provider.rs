//! ShowingProvider trait definition.
//!
//! This module defines the [`ShowingProvider`] trait, the single capability
//! every cinema source implements. Whether a source is backed by a JSON API or
//! by scraping HTML is invisible to callers: both produce a
//! [`SourceResult`] for a [`DateRange`].
//!
//! Providers are responsible for:
//! - Fetching raw listings and memoizing them through the daily cache
//! - Normalizing, deduplicating, range-filtering and sorting them
//! - Reporting source-level failures as [`ProviderError`]s

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use chrono::NaiveDate;
use kinocal_core::{DateRange, SourceResult};

use crate::error::{ProviderError, ProviderResult};

/// How a source publishes its listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A JSON API (possibly with embedded HTML fragments).
    Json,
    /// Server-rendered HTML pages.
    Html,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Html => write!(f, "html"),
        }
    }
}

/// A boxed future for async trait methods.
///
/// Keeps the trait object-safe so the aggregator can hold a heterogeneous
/// list of `Arc<dyn ShowingProvider>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The core abstraction for cinema sources.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; the aggregator runs each one on
///   its own task.
/// - The result must contain no date outside the requested range, even when
///   the upstream returns a wider window.
/// - Per-record and per-day problems are logged and skipped; only a failure
///   of the whole source is returned as an error.
/// - A missing or rejected credential must surface as an error for which
///   [`ProviderError::is_configuration`] is true.
pub trait ShowingProvider: Send + Sync {
    /// Returns the source name (e.g., "alamo", "coolidge"). Also used as the
    /// cache namespace.
    fn name(&self) -> &str;

    /// Returns how the source publishes its listings.
    fn kind(&self) -> SourceKind;

    /// Fetches the showings for `range`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` when the source as a whole cannot produce a
    /// result: bad configuration, network failure, or an unparseable payload.
    fn fetch_showings(&self, range: DateRange) -> BoxFuture<'_, ProviderResult<SourceResult>>;

    /// Drops this source's cache entries stamped with `day` (default: today),
    /// forcing the next fetch to go upstream.
    ///
    /// The default implementation has nothing to invalidate.
    fn invalidate_cache(&self, _day: Option<NaiveDate>) -> ProviderResult<()> {
        Ok(())
    }
}

/// A provider that always returns an error.
///
/// Used as a placeholder when a source fails to initialize (for instance a
/// missing access token), so the run reports the failure instead of silently
/// omitting the source.
#[derive(Debug)]
pub struct ErrorProvider {
    name: String,
    kind: SourceKind,
    error: ProviderError,
}

impl ErrorProvider {
    /// Creates a new error provider.
    pub fn new(name: impl Into<String>, kind: SourceKind, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            kind,
            error,
        }
    }

    /// The error every fetch returns.
    pub fn error(&self) -> &ProviderError {
        &self.error
    }
}

impl ShowingProvider for ErrorProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn fetch_showings(&self, _range: DateRange) -> BoxFuture<'_, ProviderResult<SourceResult>> {
        // ProviderError is not Clone because of its boxed cause
        let error =
            ProviderError::new(self.error.code(), self.error.message()).with_provider(&self.name);
        Box::pin(async move { Err(error) })
    }
}
