//! Log setup shared by the engine crates and the `kinocal` binary.
//!
//! Logs always go to stderr; stdout carries the calendar. The filter
//! defaults to `kinocal=<level>`, which covers every `kinocal_*` target, and
//! `RUST_LOG` replaces it when set.
//!
//! ```ignore
//! use kinocal_core::tracing::{init_tracing, TracingConfig};
//!
//! // interactive run with --debug
//! init_tracing(TracingConfig::cli_debug())?;
//!
//! // cron job whose stderr is shipped to a log collector
//! init_tracing(TracingConfig::batch())?;
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("a global tracing subscriber is already installed: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("invalid log filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Line format of emitted records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Multi-line, for reading a single run closely.
    Pretty,
    /// One line per record.
    #[default]
    Compact,
    /// One JSON object per record.
    Json,
}

/// How `init_tracing` builds the subscriber.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level for `kinocal*` targets when no explicit filter is given.
    pub default_level: Level,
    pub output_format: TracingOutputFormat,
    /// Source file and line of each record.
    pub include_location: bool,
    /// Module path of each record.
    pub include_target: bool,
    pub include_timestamp: bool,
    /// Emit a record when a span opens and closes.
    pub include_span_events: bool,
    /// Explicit filter directive; takes precedence over `RUST_LOG`.
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    /// Quiet: warnings only, so skipped records and failed sources still show.
    fn default() -> Self {
        Self {
            default_level: Level::WARN,
            output_format: TracingOutputFormat::Compact,
            include_location: false,
            include_target: false,
            include_timestamp: false,
            include_span_events: false,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    /// `--debug`: cache hits and misses, requests, every skipped record.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_location: true,
            include_target: true,
            ..Self::default()
        }
    }

    /// Unattended runs: JSON lines with timestamps and span boundaries.
    #[must_use]
    pub fn batch() -> Self {
        Self {
            default_level: Level::INFO,
            output_format: TracingOutputFormat::Json,
            include_location: true,
            include_target: true,
            include_timestamp: true,
            include_span_events: true,
            env_filter: None,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Directive used when neither `env_filter` nor `RUST_LOG` is set.
    pub fn default_directive(&self) -> String {
        format!("kinocal={}", self.default_level.as_str().to_ascii_lowercase())
    }

    /// Resolves the filter: explicit directive, then `RUST_LOG`, then the
    /// default directive.
    ///
    /// # Errors
    ///
    /// Fails if the explicit directive does not parse. A malformed
    /// `RUST_LOG` falls back to the default instead.
    pub fn filter(&self) -> Result<EnvFilter, TracingError> {
        match self.env_filter {
            Some(ref directive) => Ok(EnvFilter::try_new(directive)?),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.default_directive()))),
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_target(self.include_target)
            .with_span_events(self.span_events());

        match (self.output_format, self.include_timestamp) {
            (TracingOutputFormat::Pretty, _) => base.pretty().boxed(),
            (TracingOutputFormat::Json, _) => base.json().boxed(),
            (TracingOutputFormat::Compact, true) => base.compact().boxed(),
            (TracingOutputFormat::Compact, false) => base.compact().without_time().boxed(),
        }
    }
}

/// Installs the global subscriber. Call once, before any source runs.
///
/// # Errors
///
/// Fails if a subscriber is already installed or the explicit filter
/// directive is invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.filter()?;
    let subscriber = tracing_subscriber::registry()
        .with(config.layer())
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
