//! Builds the configured sources, in calendar order.

use std::sync::Arc;
use std::time::Duration;

use kinocal_providers::sources::{alamo, brattle, coolidge, harvard, landmark, regent, somerville};
use kinocal_providers::{
    AlamoConfig, AlamoProvider, BrattleConfig, BrattleProvider, CoolidgeConfig, CoolidgeProvider,
    DailyCache, ErrorProvider, HarvardFilmArchiveConfig, HarvardFilmArchiveProvider, HttpClient,
    LandmarkConfig, LandmarkProvider, ProviderError, ProviderResult, RegentConfig, RegentProvider,
    ShowingProvider, SomervilleConfig, SomervilleProvider, SourceKind,
};
use tracing::{debug, warn};

use crate::config::{ClientConfig, SourceSettings};
use crate::secret;

/// Every source the client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceId {
    Somerville,
    Brattle,
    Regent,
    Coolidge,
    Alamo,
    Landmark,
    Harvard,
}

impl SourceId {
    /// Calendar order.
    pub const ALL: [SourceId; 7] = [
        SourceId::Somerville,
        SourceId::Brattle,
        SourceId::Regent,
        SourceId::Coolidge,
        SourceId::Alamo,
        SourceId::Landmark,
        SourceId::Harvard,
    ];

    /// Provider name, which is also its cache namespace.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Somerville => somerville::NAME,
            SourceId::Brattle => brattle::NAME,
            SourceId::Regent => regent::NAME,
            SourceId::Coolidge => coolidge::NAME,
            SourceId::Alamo => alamo::NAME,
            SourceId::Landmark => landmark::NAME,
            SourceId::Harvard => harvard::NAME,
        }
    }

    /// Cinema name used when the config sets no label.
    pub fn default_label(&self) -> &'static str {
        match self {
            SourceId::Somerville => "Somerville Theatre",
            SourceId::Brattle => "The Brattle",
            SourceId::Regent => "Regent Theatre",
            SourceId::Coolidge => "Coolidge Corner Theatre",
            SourceId::Alamo => "Alamo Drafthouse",
            SourceId::Landmark => "Landmark Kendall Square Cinema",
            SourceId::Harvard => "Harvard Film Archive",
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceId::Somerville | SourceId::Regent | SourceId::Alamo | SourceId::Landmark => {
                SourceKind::Json
            }
            SourceId::Brattle | SourceId::Coolidge | SourceId::Harvard => SourceKind::Html,
        }
    }

    fn settings<'a>(&self, config: &'a ClientConfig) -> &'a SourceSettings {
        let sources = &config.sources;
        match self {
            SourceId::Somerville => &sources.somerville.common,
            SourceId::Brattle => &sources.brattle,
            SourceId::Regent => &sources.regent,
            SourceId::Coolidge => &sources.coolidge.common,
            SourceId::Alamo => &sources.alamo.common,
            SourceId::Landmark => &sources.landmark.common,
            SourceId::Harvard => &sources.harvard,
        }
    }

    pub fn is_enabled(&self, config: &ClientConfig) -> bool {
        self.settings(config).enabled
    }

    /// Configured label, or the default one.
    pub fn label(&self, config: &ClientConfig) -> String {
        self.settings(config)
            .label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(self.default_label())
            .to_string()
    }
}

/// A source ready to hand to the aggregator.
pub struct ConfiguredSource {
    pub id: SourceId,
    pub label: String,
    pub provider: Arc<dyn ShowingProvider>,
}

/// Builds every enabled source.
///
/// A source that cannot be constructed (no token, bad URL) is replaced by an
/// [`ErrorProvider`] so the run reports it instead of dropping it.
pub fn build_sources(config: &ClientConfig, http: &HttpClient, cache: &DailyCache) -> Vec<ConfiguredSource> {
    SourceId::ALL
        .into_iter()
        .filter(|id| {
            let enabled = id.is_enabled(config);
            if !enabled {
                debug!(source = id.as_str(), "source disabled");
            }
            enabled
        })
        .map(|id| {
            let provider = build_provider(id, config, http, cache).unwrap_or_else(|e| -> Arc<dyn ShowingProvider> {
                warn!(source = id.as_str(), error = %e, "source unavailable");
                Arc::new(ErrorProvider::new(id.as_str(), id.kind(), e))
            });
            ConfiguredSource {
                id,
                label: id.label(config),
                provider,
            }
        })
        .collect()
}

fn build_provider(
    id: SourceId,
    config: &ClientConfig,
    http: &HttpClient,
    cache: &DailyCache,
) -> ProviderResult<Arc<dyn ShowingProvider>> {
    let http = http.clone();
    let cache = cache.clone();
    let sources = &config.sources;

    let provider: Arc<dyn ShowingProvider> = match id {
        SourceId::Somerville => {
            let token = somerville_token(sources.somerville.token.as_deref())?;
            Arc::new(SomervilleProvider::new(SomervilleConfig::new(token), http, cache)?)
        }
        SourceId::Brattle => Arc::new(BrattleProvider::new(BrattleConfig::default(), http, cache)?),
        SourceId::Regent => Arc::new(RegentProvider::new(RegentConfig::default(), http, cache)?),
        SourceId::Coolidge => {
            let config = CoolidgeConfig::default()
                .with_request_interval(Duration::from_millis(sources.coolidge.request_interval_ms));
            Arc::new(CoolidgeProvider::new(config, http, cache)?)
        }
        SourceId::Alamo => {
            let config = AlamoConfig::for_market(sources.alamo.market.trim());
            Arc::new(AlamoProvider::new(config, http, cache)?)
        }
        SourceId::Landmark => {
            let mut config = LandmarkConfig::default()
                .with_film_page_probing(sources.landmark.probe_film_pages);
            if let Some(ref theater) = sources.landmark.theater_id {
                config = config.with_theater(theater);
            }
            Arc::new(LandmarkProvider::new(config, http, cache)?)
        }
        SourceId::Harvard => Arc::new(HarvardFilmArchiveProvider::new(
            HarvardFilmArchiveConfig::default(),
            http,
            cache,
        )?),
    };
    Ok(provider)
}

fn somerville_token(raw: Option<&str>) -> ProviderResult<String> {
    let raw = raw.ok_or_else(|| {
        ProviderError::configuration("no Veezi access token; set sources.somerville.token")
            .with_provider(somerville::NAME)
    })?;
    secret::resolve(raw).map_err(|e| {
        ProviderError::configuration(format!("failed to resolve Veezi access token: {}", e))
            .with_provider(somerville::NAME)
            .with_source(e)
    })
}
