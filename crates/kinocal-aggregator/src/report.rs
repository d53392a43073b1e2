//! Per-run report of which sources succeeded and which failed.

use std::fmt;

use chrono::{DateTime, Utc};
use kinocal_core::DateRange;
use kinocal_providers::ProviderError;
use serde::Serialize;

/// Why a source contributed nothing to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Missing or rejected credentials, bad endpoint configuration.
    Configuration,
    /// Network, HTTP or payload failure.
    Fetch,
    /// The source did not finish within the configured timeout.
    Timeout,
    /// The source's task panicked.
    Panicked,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Configuration => "configuration",
            FailureKind::Fetch => "fetch",
            FailureKind::Timeout => "timeout",
            FailureKind::Panicked => "panicked",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source's failure during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    /// Cinema name the source was registered under.
    pub cinema: String,
    /// Provider name (`alamo`, `coolidge`, ...).
    pub source: String,
    pub kind: FailureKind,
    pub message: String,
}

impl SourceFailure {
    /// Classifies a provider error.
    pub fn from_provider_error(cinema: &str, source: &str, error: &ProviderError) -> Self {
        let kind = if error.is_configuration() {
            FailureKind::Configuration
        } else {
            FailureKind::Fetch
        };
        Self {
            cinema: cinema.to_string(),
            source: source.to_string(),
            kind,
            message: error.to_string(),
        }
    }

    pub fn timeout(cinema: &str, source: &str, after: std::time::Duration) -> Self {
        Self {
            cinema: cinema.to_string(),
            source: source.to_string(),
            kind: FailureKind::Timeout,
            message: format!("no result after {}s", after.as_secs_f64()),
        }
    }

    pub fn panicked(cinema: &str, source: &str, detail: impl Into<String>) -> Self {
        Self {
            cinema: cinema.to_string(),
            source: source.to_string(),
            kind: FailureKind::Panicked,
            message: detail.into(),
        }
    }
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {} failure: {}", self.cinema, self.source, self.kind, self.message)
    }
}

/// Outcome of one aggregation run, alongside the calendar.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub range: DateRange,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Cinemas whose source returned a result, in registration order.
    pub succeeded: Vec<String>,
    /// Failed sources, in registration order.
    pub failures: Vec<SourceFailure>,
}

impl RunReport {
    pub(crate) fn new(range: DateRange) -> Self {
        let now = Utc::now();
        Self {
            range,
            started_at: now,
            finished_at: now,
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// True when every source produced a result.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failure for a cinema, if its source failed.
    pub fn failure(&self, cinema: &str) -> Option<&SourceFailure> {
        self.failures.iter().find(|f| f.cinema == cinema)
    }

    /// Number of sources that ran.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn range() -> DateRange {
        DateRange::single(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap())
    }

    #[test]
    fn configuration_errors_are_classified() {
        let err = ProviderError::configuration("no token").with_provider("somerville");
        let failure = SourceFailure::from_provider_error("Somerville Theatre", "somerville", &err);
        assert_eq!(failure.kind, FailureKind::Configuration);

        let err = ProviderError::authentication("token rejected");
        let failure = SourceFailure::from_provider_error("Somerville Theatre", "somerville", &err);
        assert_eq!(failure.kind, FailureKind::Configuration);

        let err = ProviderError::server("502");
        let failure = SourceFailure::from_provider_error("The Brattle", "brattle", &err);
        assert_eq!(failure.kind, FailureKind::Fetch);
    }

    #[test]
    fn failure_serializes_with_snake_case_kind() {
        let failure = SourceFailure::timeout("Coolidge Corner Theatre", "coolidge", Duration::from_secs(30));
        insta::assert_json_snapshot!(failure, @r###"
        {
          "cinema": "Coolidge Corner Theatre",
          "source": "coolidge",
          "kind": "timeout",
          "message": "no result after 30s"
        }
        "###);
    }

    #[test]
    fn completeness() {
        let mut report = RunReport::new(range());
        report.succeeded.push("Alamo Drafthouse".to_string());
        assert!(report.is_complete());

        report.failures.push(SourceFailure::panicked("The Brattle", "brattle", "boom"));
        assert!(!report.is_complete());
        assert_eq!(report.total(), 2);
        assert_eq!(report.failure("The Brattle").unwrap().kind, FailureKind::Panicked);
        assert!(report.failure("Alamo Drafthouse").is_none());
    }

    #[test]
    fn display_names_cinema_and_kind() {
        let failure = SourceFailure::panicked("The Brattle", "brattle", "boom");
        assert_eq!(failure.to_string(), "The Brattle (brattle): panicked failure: boom");
    }
}
