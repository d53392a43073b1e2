//! The Brattle Theatre's "coming soon" page.
//!
//! A single HTML page lists every upcoming film with a date selector whose
//! entries carry Unix timestamps. The page is scraped once per day, the whole
//! window is normalized and cached, and each request is served by restricting
//! that cached window.

use chrono::NaiveDate;
use kinocal_core::{DateRange, SourceResult};
use scraper::Html;
use tracing::{debug, trace, warn};
use url::Url;

use crate::cache::{CacheKey, DailyCache};
use crate::error::ProviderResult;
use crate::http::HttpClient;
use crate::normalize::{build_source_result, date_from_unix};
use crate::provider::{BoxFuture, ShowingProvider, SourceKind};
use crate::raw_showing::RawShowing;

use super::{element_text, invalidate_source, parse_url, selector};

/// Source name and cache namespace.
pub const NAME: &str = "brattle";

/// Brattle configuration.
#[derive(Debug, Clone)]
pub struct BrattleConfig {
    /// The coming-soon page.
    pub coming_soon_url: String,
    /// Path fragment that marks film pages; other events are skipped.
    pub film_path: String,
}

impl Default for BrattleConfig {
    fn default() -> Self {
        Self {
            coming_soon_url: "https://brattlefilm.org/coming-soon/".to_string(),
            film_path: "/movies/".to_string(),
        }
    }
}

impl BrattleConfig {
    /// Overrides the page URL.
    pub fn with_coming_soon_url(mut self, url: impl Into<String>) -> Self {
        self.coming_soon_url = url.into();
        self
    }
}

/// Extracts one raw showing per film per listed date.
///
/// Links outside `film_path` (talks, parties) and films without any listed
/// date are skipped.
pub fn parse_coming_soon(html: &str, film_path: &str) -> ProviderResult<Vec<RawShowing>> {
    let doc = Html::parse_document(html);
    let show_sel = selector("div.show-details")?;
    let title_sel = selector("a.title")?;
    let date_sel = selector("div[class*='date-selector'] li[data-date]")?;

    let mut raws = Vec::new();
    for show in doc.select(&show_sel) {
        let Some(link) = show.select(&title_sel).next() else {
            trace!(source = NAME, "show without title link");
            continue;
        };
        let title = element_text(link);
        let Some(href) = link.value().attr("href").map(str::trim) else {
            warn!(source = NAME, title = %title, "skipping show without link");
            continue;
        };
        if !href.contains(film_path) {
            debug!(source = NAME, title = %title, href = %href, "not a film");
            continue;
        }

        let mut dates: Vec<NaiveDate> = show
            .select(&date_sel)
            .filter_map(|node| {
                let raw = node.value().attr("data-date")?;
                let parsed = raw.trim().parse::<i64>().ok().and_then(date_from_unix);
                if parsed.is_none() {
                    warn!(source = NAME, identity = %href, raw = %raw, "unparseable date");
                }
                parsed
            })
            .collect();
        if dates.is_empty() {
            debug!(source = NAME, title = %title, "no dates listed");
            continue;
        }
        dates.sort_unstable();
        dates.dedup();

        for date in dates {
            raws.push(RawShowing::new(href, date, title.as_str()).with_url(href));
        }
    }
    Ok(raws)
}

/// Smallest range covering every raw date, if any.
fn window_of(raws: &[RawShowing]) -> Option<DateRange> {
    let from = raws.iter().map(|r| r.date).min()?;
    let to = raws.iter().map(|r| r.date).max()?;
    DateRange::new(from, to).ok()
}

/// The Brattle provider.
pub struct BrattleProvider {
    config: BrattleConfig,
    http: HttpClient,
    cache: DailyCache,
    base: Url,
}

impl BrattleProvider {
    /// Creates a new provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the page URL does not parse.
    pub fn new(config: BrattleConfig, http: HttpClient, cache: DailyCache) -> ProviderResult<Self> {
        let base = parse_url(NAME, &config.coming_soon_url)?;
        Ok(Self {
            config,
            http,
            cache,
            base,
        })
    }

    fn cache_key() -> CacheKey {
        CacheKey::new(NAME).with_qualifier("coming-soon")
    }

    async fn download(&self) -> ProviderResult<SourceResult> {
        let html = self.http.get_text(&self.config.coming_soon_url).await?;
        let raws = parse_coming_soon(&html, &self.config.film_path)?;
        Ok(match window_of(&raws) {
            Some(window) => build_source_result(NAME, raws, &window, &self.base),
            None => SourceResult::new(),
        })
    }
}

impl ShowingProvider for BrattleProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Html
    }

    fn fetch_showings(&self, range: DateRange) -> BoxFuture<'_, ProviderResult<SourceResult>> {
        Box::pin(async move {
            let window = self
                .cache
                .get_or_compute(&Self::cache_key(), || self.download())
                .await
                .map_err(|e| e.with_provider(NAME))?;
            Ok(window.restricted_to(&range))
        })
    }

    fn invalidate_cache(&self, day: Option<NaiveDate>) -> ProviderResult<()> {
        invalidate_source(&self.cache, NAME, day)
    }
}
