//! kinocal CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use kinocal_client::cli::{CacheAction, Cli, Command, ConfigAction};
use kinocal_client::commands;
use kinocal_client::config::ClientConfig;
use kinocal_client::error::{ClientError, ClientResult};
use kinocal_core::{TracingConfig, init_tracing};
use tracing::Level;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tracing_config = match (cli.log_json, cli.debug || config.debug) {
        (true, true) => TracingConfig::batch().with_level(Level::DEBUG),
        (true, false) => TracingConfig::batch(),
        (false, true) => TracingConfig::cli_debug(),
        (false, false) => TracingConfig::default(),
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(&cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    match cli.config {
        Some(ref path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    }
    .map_err(ClientError::Config)
}

async fn run(cli: &Cli, config: &ClientConfig) -> ClientResult<()> {
    match cli.command {
        Some(Command::Config { ref action }) => match action {
            ConfigAction::Dump => commands::config::dump(config),
            ConfigAction::Validate => commands::config::validate(config),
            ConfigAction::Path => commands::config::path(),
        },
        Some(Command::Cache { ref action }) => match action {
            CacheAction::Clear { sources, stale } => commands::cache::clear(config, sources, *stale),
            CacheAction::Path => commands::cache::path(config),
        },
        None => {
            config.validate().map_err(ClientError::Config)?;
            commands::fetch::run(cli, config).await.map(|_| ())
        }
    }
}
