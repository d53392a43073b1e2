//! Configuration commands.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::secret;
use crate::sources::SourceId;

/// Dump the current configuration to stdout.
///
/// Inline secrets are masked; references are shown as written.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    let mut shown = config.clone();
    if let Some(ref token) = shown.sources.somerville.token {
        if !secret::is_reference(token) {
            shown.sources.somerville.token = Some("********".to_string());
        }
    }

    let toml_str = toml::to_string_pretty(&shown)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", ClientConfig::default_path().display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate().map_err(ClientError::Config)?;

    let enabled: Vec<_> = SourceId::ALL
        .into_iter()
        .filter(|id| id.is_enabled(config))
        .collect();
    if enabled.is_empty() {
        return Err(ClientError::Config("every source is disabled".to_string()));
    }

    if SourceId::Somerville.is_enabled(config) {
        match config.sources.somerville.token.as_deref() {
            Some(token) => {
                secret::resolve(token).map_err(|e| {
                    ClientError::Config(format!("invalid sources.somerville.token: {}", e))
                })?;
                println!("Somerville token resolves.");
            }
            None => println!("warning: sources.somerville has no token and will be reported as failed"),
        }
    }

    for id in enabled {
        println!("  {:<11} {}", id.as_str(), id.label(config));
    }
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path() -> ClientResult<()> {
    let config_path = ClientConfig::default_path();
    println!("config: {}", config_path.display());
    Ok(())
}
