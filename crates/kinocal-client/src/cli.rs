//! Command-line interface definition.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::config::MAX_DAYS;
use crate::sources::SourceId;

/// kinocal - What's playing at your cinemas this week
#[derive(Debug, Parser)]
#[command(name = "kinocal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "KINOCAL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log as JSON lines with timestamps (for unattended runs)
    #[arg(long, global = true)]
    pub log_json: bool,

    // --- Range flags ---
    /// First day to fetch (YYYY-MM-DD); defaults to today
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Number of days to fetch; overrides the config
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_DAYS)))]
    pub days: Option<u32>,

    // --- Run flags ---
    /// Ignore today's cached entries and fetch again
    #[arg(long)]
    pub refresh: bool,

    /// Fetch one source at a time
    #[arg(long)]
    pub sequential: bool,

    /// Only fetch these sources (can be repeated)
    #[arg(long = "source", value_enum, action = clap::ArgAction::Append)]
    pub sources: Vec<SourceId>,

    // --- Output flags ---
    /// Write the calendar to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Print the run report as JSON on stderr
    #[arg(long)]
    pub report: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Cache commands
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

/// Cache actions.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Remove cached entries
    Clear {
        /// Only clear these sources (can be repeated)
        #[arg(long = "source", value_enum, action = clap::ArgAction::Append)]
        sources: Vec<SourceId>,

        /// Remove entries from previous days instead of today's
        #[arg(long)]
        stale: bool,
    },

    /// Show the cache directory
    Path,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fetch_flags_parse() {
        let cli = Cli::try_parse_from([
            "kinocal", "--from", "2025-01-05", "--days", "3", "--refresh", "--sequential",
            "--source", "brattle", "--source", "coolidge", "-o", "out.json",
        ])
        .unwrap();
        assert_eq!(cli.from, NaiveDate::from_ymd_opt(2025, 1, 5));
        assert_eq!(cli.days, Some(3));
        assert!(cli.refresh);
        assert!(cli.sequential);
        assert_eq!(cli.sources, vec![SourceId::Brattle, SourceId::Coolidge]);
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));
        assert!(cli.command.is_none());
        assert!(!cli.log_json);
    }

    #[test]
    fn bad_date_and_zero_days_are_rejected() {
        assert!(Cli::try_parse_from(["kinocal", "--from", "05/01/2025"]).is_err());
        assert!(Cli::try_parse_from(["kinocal", "--days", "0"]).is_err());
        assert!(Cli::try_parse_from(["kinocal", "--days", "63"]).is_err());
    }

    #[test]
    fn cache_clear_parses() {
        let cli = Cli::try_parse_from(["kinocal", "cache", "clear", "--source", "regent", "--stale"]).unwrap();
        match cli.command {
            Some(Command::Cache {
                action: CacheAction::Clear { sources, stale },
            }) => {
                assert_eq!(sources, vec![SourceId::Regent]);
                assert!(stale);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
