//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/kinocal/config.toml` by default. Every section is optional:
//! an empty file enables every source with its default label.
//!
//! ```toml
//! [run]
//! days = 7
//!
//! [sources.somerville]
//! token = "env::VEEZI_TOKEN"
//!
//! [sources.alamo]
//! label = "Alamo Seaport"
//! market = "boston"
//!
//! [sources.harvard]
//! enabled = false
//! ```
//!
//! The Somerville `token` supports secret references:
//! - `pass::path/in/store` resolved via `pass show`
//! - `env::VAR_NAME` resolved from the environment
//! - plain text used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use kinocal_aggregator::{AggregatorConfig, FailurePolicy};
use kinocal_providers::HttpConfig;
use serde::{Deserialize, Serialize};

/// Configuration for the kinocal client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Cache directory; defaults to the platform cache dir.
    pub cache_dir: Option<PathBuf>,

    /// HTTP settings shared by every source.
    pub http: HttpSettings,

    /// Run settings.
    pub run: RunSettings,

    /// Per-source settings.
    pub sources: SourcesSettings,
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Request timeout in seconds.
    pub timeout: u64,

    /// User agent override.
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agent: None,
        }
    }
}

/// Longest range a single run may request, in days.
pub const MAX_DAYS: u32 = 62;

/// Aggregation run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Number of days to fetch, starting today.
    pub days: u32,

    /// Fetch sources in parallel.
    pub concurrent: bool,

    /// Per-source timeout in seconds.
    pub source_timeout: u64,

    /// Keep failed cinemas in the output with no showings.
    pub include_failed: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            days: 7,
            concurrent: true,
            source_timeout: 120,
            include_failed: false,
        }
    }
}

/// Settings every source shares.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Whether the source runs at all.
    pub enabled: bool,

    /// Cinema name in the output; each source has its own default.
    pub label: Option<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            label: None,
        }
    }
}

/// Somerville Theatre settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SomervilleSettings {
    #[serde(flatten)]
    pub common: SourceSettings,

    /// Veezi access token (supports `pass::` and `env::` prefixes).
    pub token: Option<String>,
}

/// Alamo Drafthouse settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlamoSettings {
    #[serde(flatten)]
    pub common: SourceSettings,

    /// Market slug in the Alamo API.
    pub market: String,
}

impl Default for AlamoSettings {
    fn default() -> Self {
        Self {
            common: SourceSettings::default(),
            market: "boston".to_string(),
        }
    }
}

/// Landmark Theatres settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkSettings {
    #[serde(flatten)]
    pub common: SourceSettings,

    /// Theatre id; defaults to Kendall Square.
    pub theater_id: Option<String>,

    /// Look for a film page before falling back to the ticketing link.
    pub probe_film_pages: bool,
}

impl Default for LandmarkSettings {
    fn default() -> Self {
        Self {
            common: SourceSettings::default(),
            theater_id: None,
            probe_film_pages: true,
        }
    }
}

/// Coolidge Corner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoolidgeSettings {
    #[serde(flatten)]
    pub common: SourceSettings,

    /// Minimum spacing between day requests, in milliseconds.
    pub request_interval_ms: u64,
}

impl Default for CoolidgeSettings {
    fn default() -> Self {
        Self {
            common: SourceSettings::default(),
            request_interval_ms: 500,
        }
    }
}

/// The `[sources.*]` tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesSettings {
    pub somerville: SomervilleSettings,
    pub brattle: SourceSettings,
    pub regent: SourceSettings,
    pub coolidge: CoolidgeSettings,
    pub alamo: AlamoSettings,
    pub landmark: LandmarkSettings,
    pub harvard: SourceSettings,
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if it is absent.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| format!("failed to parse config {}: {}", path.display(), e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kinocal")
    }

    /// Returns the default cache directory.
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kinocal")
    }

    /// The cache directory in effect.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(Self::default_cache_dir)
    }

    /// HTTP client configuration.
    pub fn http_config(&self) -> HttpConfig {
        let config = HttpConfig::default().with_timeout(Duration::from_secs(self.http.timeout));
        match self.http.user_agent {
            Some(ref agent) => config.with_user_agent(agent),
            None => config,
        }
    }

    /// Aggregator configuration.
    pub fn aggregator_config(&self) -> AggregatorConfig {
        let policy = if self.run.include_failed {
            FailurePolicy::IncludeEmpty
        } else {
            FailurePolicy::Omit
        };
        AggregatorConfig::default()
            .with_source_timeout(Duration::from_secs(self.run.source_timeout))
            .with_concurrent(self.run.concurrent)
            .with_failure_policy(policy)
    }

    /// Checks values that parse but cannot work.
    pub fn validate(&self) -> Result<(), String> {
        if self.run.days == 0 || self.run.days > MAX_DAYS {
            return Err(format!("run.days must be between 1 and {}", MAX_DAYS));
        }
        if self.run.source_timeout == 0 {
            return Err("run.source_timeout must be at least 1 second".to_string());
        }
        if self.http.timeout == 0 {
            return Err("http.timeout must be at least 1 second".to_string());
        }
        if self.sources.alamo.market.trim().is_empty() {
            return Err("sources.alamo.market must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_enables_everything() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert!(config.sources.somerville.common.enabled);
        assert!(config.sources.harvard.enabled);
        assert_eq!(config.sources.alamo.market, "boston");
        assert!(config.sources.landmark.probe_film_pages);
        assert_eq!(config.run.days, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn source_tables_parse() {
        let toml_content = r#"
cache_dir = "/tmp/kinocal-cache"

[run]
days = 3
concurrent = false
include_failed = true

[sources.somerville]
token = "env::VEEZI_TOKEN"

[sources.alamo]
label = "Alamo Seaport"
market = "nyc"

[sources.harvard]
enabled = false

[sources.coolidge]
request_interval_ms = 1500
"#;
        let config: ClientConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/kinocal-cache"));
        assert_eq!(config.run.days, 3);
        assert_eq!(config.sources.somerville.token.as_deref(), Some("env::VEEZI_TOKEN"));
        assert_eq!(config.sources.alamo.common.label.as_deref(), Some("Alamo Seaport"));
        assert_eq!(config.sources.alamo.market, "nyc");
        assert!(!config.sources.harvard.enabled);
        assert!(config.sources.brattle.enabled);
        assert_eq!(config.sources.coolidge.request_interval_ms, 1500);

        let aggregator = config.aggregator_config();
        assert!(!aggregator.concurrent);
        assert_eq!(aggregator.failure_policy, FailurePolicy::IncludeEmpty);
    }

    #[test]
    fn unparseable_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[run]\ndays = \"many\"\n").unwrap();
        let err = ClientConfig::load_from(&path).unwrap_err();
        assert!(err.contains("failed to parse"));
        assert!(err.contains("config.toml"));
    }

    #[test]
    fn validate_rejects_zero_days() {
        let mut config = ClientConfig::default();
        config.run.days = 0;
        assert!(config.validate().unwrap_err().contains("run.days"));
    }

    #[test]
    fn validate_rejects_oversized_ranges() {
        let mut config = ClientConfig::default();
        config.run.days = MAX_DAYS;
        assert!(config.validate().is_ok());
        config.run.days = u32::MAX;
        assert!(config.validate().unwrap_err().contains("run.days"));
    }

    #[test]
    fn dump_round_trips_through_toml() {
        let mut config = ClientConfig::default();
        config.sources.brattle.label = Some("Brattle".to_string());
        let text = toml::to_string_pretty(&config).unwrap();
        let back: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.sources.brattle.label.as_deref(), Some("Brattle"));
        assert_eq!(back.run.days, config.run.days);
    }

    #[test]
    fn default_paths_are_namespaced() {
        assert!(ClientConfig::default_path().ends_with("kinocal/config.toml"));
        assert!(ClientConfig::default_cache_dir().ends_with("kinocal"));
    }
}
