//! Cinema showing sources and the plumbing they share.
//!
//! This crate turns heterogeneous upstream listings into per-day
//! [`SourceResult`](kinocal_core::SourceResult)s:
//!
//! - [`ShowingProvider`] - The trait every source implements
//! - [`RawShowing`] - A parsed but unvalidated listing record
//! - [`build_source_result`] - Filter, normalize, deduplicate and sort
//! - [`DailyCache`] - On-disk cache whose entries expire at midnight
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │  JSON APIs   │   │  HTML pages  │
//! └──────┬───────┘   └──────┬───────┘
//!        │  HttpClient      │
//!        ▼                  ▼
//! ┌──────────────┐   ┌──────────────┐
//! │ parse_* (sync, per source)      │
//! └──────────────┬──────────────────┘
//!                ▼
//!         ┌─────────────┐
//!         │ RawShowing  │
//!         └──────┬──────┘
//!                ▼ build_source_result()
//!         ┌──────────────┐
//!         │ SourceResult │ ◀──▶ DailyCache
//!         └──────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod http;
pub mod normalize;
pub mod probe;
pub mod provider;
pub mod raw_showing;
pub mod sources;
pub mod throttle;

// Re-export main types at crate root
pub use cache::{CacheKey, DailyCache};
pub use error::{NormalizeError, ProviderError, ProviderErrorCode, ProviderResult};
pub use http::{HttpClient, HttpConfig};
pub use normalize::{build_source_result, normalize_showing};
pub use probe::UrlProbe;
pub use provider::{BoxFuture, ErrorProvider, ShowingProvider, SourceKind};
pub use raw_showing::RawShowing;
pub use sources::{
    AlamoConfig, AlamoProvider, BrattleConfig, BrattleProvider, CoolidgeConfig, CoolidgeProvider,
    HarvardFilmArchiveConfig, HarvardFilmArchiveProvider, LandmarkConfig, LandmarkProvider,
    RegentConfig, RegentProvider, SomervilleConfig, SomervilleProvider,
};
pub use throttle::Throttle;
