//! Aggregator configuration.

use std::time::Duration;

/// What to put in the calendar for a cinema whose source failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Leave the cinema out of the calendar.
    #[default]
    Omit,
    /// Keep the cinema with an empty result.
    IncludeEmpty,
}

/// Aggregator configuration.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Upper bound on a single source's fetch.
    pub source_timeout: Duration,

    /// Run sources in parallel instead of one after another.
    pub concurrent: bool,

    /// How failed sources show up in the calendar.
    pub failure_policy: FailurePolicy,

    /// Drop today's cache entries before fetching.
    pub force_refresh: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(120),
            concurrent: true,
            failure_policy: FailurePolicy::Omit,
            force_refresh: false,
        }
    }
}

impl AggregatorConfig {
    /// Builder: set the per-source timeout.
    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    /// Builder: run sources concurrently or sequentially.
    pub fn with_concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Builder: set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Builder: invalidate cached entries before fetching.
    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}
