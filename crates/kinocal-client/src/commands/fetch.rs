//! Default command: fetch every source and write the calendar.

use std::io::Write;
use std::path::Path;

use chrono::{Local, NaiveDate};
use kinocal_aggregator::{Aggregator, RunReport};
use kinocal_core::{Calendar, DateRange};
use kinocal_providers::{DailyCache, HttpClient};
use tracing::{debug, info};

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::sources::{ConfiguredSource, build_sources};

/// Runs the aggregation and writes the calendar.
///
/// Source failures do not fail the command: they are printed on stderr and
/// returned in the report.
pub async fn run(cli: &Cli, config: &ClientConfig) -> ClientResult<RunReport> {
    let range = resolve_range(cli.from, cli.days.unwrap_or(config.run.days), Local::now().date_naive())?;

    let http = HttpClient::new(&config.http_config())?;
    let cache = DailyCache::new(config.cache_dir());
    debug!(cache_dir = %cache.root().display(), "using cache");

    let sources: Vec<ConfiguredSource> = build_sources(config, &http, &cache)
        .into_iter()
        .filter(|s| cli.sources.is_empty() || cli.sources.contains(&s.id))
        .collect();
    if sources.is_empty() {
        return Err(ClientError::Config("no sources enabled".into()));
    }

    let mut aggregator_config = config.aggregator_config().with_force_refresh(cli.refresh);
    if cli.sequential {
        aggregator_config = aggregator_config.with_concurrent(false);
    }
    let mut aggregator = Aggregator::new(aggregator_config);
    for source in sources {
        aggregator.add_source(source.label, source.provider)?;
    }

    let outcome = aggregator.aggregate(range).await;

    write_calendar(&outcome.calendar, cli.output.as_deref())?;
    report_failures(&outcome.report, cli.report)?;

    info!(
        range = %range,
        cinemas = outcome.calendar.len(),
        failures = outcome.report.failures.len(),
        "Calendar written"
    );
    Ok(outcome.report)
}

/// `days` days from `from` (default: `today`).
pub fn resolve_range(from: Option<NaiveDate>, days: u32, today: NaiveDate) -> ClientResult<DateRange> {
    DateRange::starting_at(from.unwrap_or(today), days).map_err(|e| ClientError::Config(e.to_string()))
}

/// The calendar as pretty JSON.
pub fn render_calendar(calendar: &Calendar) -> ClientResult<String> {
    Ok(serde_json::to_string_pretty(calendar)?)
}

fn write_calendar(calendar: &Calendar, output: Option<&Path>) -> ClientResult<()> {
    let mut rendered = render_calendar(calendar)?;
    rendered.push('\n');

    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .map_err(|e| ClientError::Output(format!("failed to write {}: {}", path.display(), e)))?;
            info!(path = %path.display(), "Wrote calendar");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn report_failures(report: &RunReport, as_json: bool) -> ClientResult<()> {
    if as_json {
        eprintln!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for failure in &report.failures {
        eprintln!("warning: {}", failure);
    }
    Ok(())
}
