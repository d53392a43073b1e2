//! Runs every registered source over one date range.
//!
//! Each source is isolated: its own timeout, its own task in concurrent mode,
//! and a failure (error, timeout or panic) only removes that one cinema from
//! the calendar. Results are merged in registration order no matter which
//! source finishes first.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::join_all;
use kinocal_core::{Calendar, DateRange, SourceResult};
use kinocal_providers::ShowingProvider;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::config::{AggregatorConfig, FailurePolicy};
use crate::error::{AggregatorError, AggregatorResult};
use crate::report::{RunReport, SourceFailure};

/// A calendar together with the report of the run that produced it.
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub calendar: Calendar,
    pub report: RunReport,
}

struct RegisteredSource {
    cinema: String,
    provider: Arc<dyn ShowingProvider>,
}

type SourceOutcome = Result<SourceResult, SourceFailure>;

/// Merges cinema sources into a [`Calendar`].
pub struct Aggregator {
    config: AggregatorConfig,
    sources: Vec<RegisteredSource>,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Registers a source under a cinema name.
    ///
    /// Cinemas appear in the calendar in the order they were added.
    ///
    /// # Errors
    ///
    /// Fails if the name is blank or already registered.
    pub fn add_source(
        &mut self,
        cinema: impl Into<String>,
        provider: Arc<dyn ShowingProvider>,
    ) -> AggregatorResult<()> {
        let cinema = cinema.into();
        if cinema.trim().is_empty() {
            return Err(AggregatorError::EmptyCinema);
        }
        if self.sources.iter().any(|s| s.cinema == cinema) {
            return Err(AggregatorError::duplicate_cinema(cinema));
        }
        debug!(cinema = %cinema, source = provider.name(), kind = %provider.kind(), "source registered");
        self.sources.push(RegisteredSource { cinema, provider });
        Ok(())
    }

    /// Registered cinema names, in order.
    pub fn cinemas(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.cinema.as_str())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Fetches every source for `range` and merges the results.
    ///
    /// Never fails: sources that error, time out or panic are recorded in
    /// the report and handled per [`FailurePolicy`].
    pub async fn aggregate(&self, range: DateRange) -> AggregateOutcome {
        info!(
            sources = self.sources.len(),
            range = %range,
            concurrent = self.config.concurrent,
            "Aggregating showings"
        );
        let mut report = RunReport::new(range);

        let outcomes = if self.config.concurrent {
            self.run_concurrent(range).await
        } else {
            self.run_sequential(range).await
        };

        let mut calendar = Calendar::new();
        for (source, outcome) in self.sources.iter().zip(outcomes) {
            match outcome {
                Ok(result) => {
                    info!(
                        cinema = %source.cinema,
                        source = source.provider.name(),
                        days = result.len_days(),
                        showings = result.total_showings(),
                        "Source finished"
                    );
                    calendar.insert(source.cinema.clone(), result);
                    report.succeeded.push(source.cinema.clone());
                }
                Err(failure) => {
                    warn!(
                        cinema = %failure.cinema,
                        source = %failure.source,
                        kind = %failure.kind,
                        error = %failure.message,
                        "Source failed"
                    );
                    if self.config.failure_policy == FailurePolicy::IncludeEmpty {
                        calendar.insert(source.cinema.clone(), SourceResult::new());
                    }
                    report.failures.push(failure);
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failures.len(),
            "Aggregation finished"
        );
        AggregateOutcome { calendar, report }
    }

    async fn run_concurrent(&self, range: DateRange) -> Vec<SourceOutcome> {
        let tasks: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                tokio::spawn(run_source(
                    source.cinema.clone(),
                    Arc::clone(&source.provider),
                    range,
                    self.config.source_timeout,
                    self.config.force_refresh,
                ))
            })
            .collect();

        join_all(tasks)
            .await
            .into_iter()
            .zip(&self.sources)
            .map(|(joined, source)| {
                joined.unwrap_or_else(|e| {
                    Err(SourceFailure::panicked(
                        &source.cinema,
                        source.provider.name(),
                        join_error_message(e),
                    ))
                })
            })
            .collect()
    }

    async fn run_sequential(&self, range: DateRange) -> Vec<SourceOutcome> {
        let mut outcomes = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let fetch = run_source(
                source.cinema.clone(),
                Arc::clone(&source.provider),
                range,
                self.config.source_timeout,
                self.config.force_refresh,
            );
            let outcome = AssertUnwindSafe(fetch).catch_unwind().await.unwrap_or_else(|payload| {
                Err(SourceFailure::panicked(
                    &source.cinema,
                    source.provider.name(),
                    panic_message(payload.as_ref()),
                ))
            });
            outcomes.push(outcome);
        }
        outcomes
    }
}

async fn run_source(
    cinema: String,
    provider: Arc<dyn ShowingProvider>,
    range: DateRange,
    timeout: Duration,
    force_refresh: bool,
) -> SourceOutcome {
    if force_refresh {
        if let Err(e) = provider.invalidate_cache(None) {
            warn!(cinema = %cinema, source = provider.name(), error = %e, "Failed to invalidate cache");
        }
    }

    match tokio::time::timeout(timeout, provider.fetch_showings(range)).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(SourceFailure::from_provider_error(&cinema, provider.name(), &e)),
        Err(_) => Err(SourceFailure::timeout(&cinema, provider.name(), timeout)),
    }
}

fn join_error_message(e: JoinError) -> String {
    if e.is_panic() {
        panic_message(e.into_panic().as_ref())
    } else {
        e.to_string()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "source panicked".to_string()
    }
}
