//! Aggregation of cinema sources into one calendar.
//!
//! This crate runs every registered [`ShowingProvider`] over a date range
//! and merges the results by cinema name:
//! - Per-source timeout and panic isolation
//! - Concurrent or sequential execution
//! - A [`RunReport`] listing which sources failed and why
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use kinocal_aggregator::{Aggregator, AggregatorConfig};
//! use kinocal_core::DateRange;
//! use kinocal_providers::{BrattleConfig, BrattleProvider, DailyCache, HttpClient, HttpConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http = HttpClient::new(&HttpConfig::default())?;
//!     let cache = DailyCache::new("/tmp/kinocal");
//!     let brattle = BrattleProvider::new(BrattleConfig::default(), http, cache)?;
//!
//!     let mut aggregator = Aggregator::new(AggregatorConfig::default());
//!     aggregator.add_source("The Brattle", Arc::new(brattle))?;
//!
//!     let today = chrono::Local::now().date_naive();
//!     let outcome = aggregator.aggregate(DateRange::week_starting(today)).await;
//!     println!("{}", serde_json::to_string_pretty(&outcome.calendar)?);
//!     Ok(())
//! }
//! ```
//!
//! [`ShowingProvider`]: kinocal_providers::ShowingProvider

mod aggregator;
mod config;
mod error;
mod report;

pub use aggregator::{AggregateOutcome, Aggregator};
pub use config::{AggregatorConfig, FailurePolicy};
pub use error::{AggregatorError, AggregatorResult};
pub use report::{FailureKind, RunReport, SourceFailure};
