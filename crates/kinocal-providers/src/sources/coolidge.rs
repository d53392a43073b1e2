//! Coolidge Corner Theatre showtimes.
//!
//! The showtimes page renders one day at a time, so a range costs one
//! request per day. Requests are paced with a [`Throttle`] and each day's
//! normalized result is cached on its own.

use chrono::NaiveDate;
use kinocal_core::{DateRange, SourceResult};
use scraper::Html;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheKey, DailyCache};
use crate::error::ProviderResult;
use crate::http::HttpClient;
use crate::normalize::build_source_result;
use crate::provider::{BoxFuture, ShowingProvider, SourceKind};
use crate::raw_showing::RawShowing;
use crate::throttle::Throttle;

use super::{element_text, invalidate_source, parse_url, selector};

/// Source name and cache namespace.
pub const NAME: &str = "coolidge";

/// Coolidge Corner configuration.
#[derive(Debug, Clone)]
pub struct CoolidgeConfig {
    /// Showtimes page; `?date=YYYY-MM-DD` is appended.
    pub showtimes_url: String,
    /// Spacing between day requests.
    pub request_interval: std::time::Duration,
}

impl Default for CoolidgeConfig {
    fn default() -> Self {
        Self {
            showtimes_url: "https://coolidge.org/showtimes".to_string(),
            request_interval: Throttle::DEFAULT_INTERVAL,
        }
    }
}

impl CoolidgeConfig {
    /// Overrides the showtimes page URL.
    pub fn with_showtimes_url(mut self, url: impl Into<String>) -> Self {
        self.showtimes_url = url.into();
        self
    }

    pub fn with_request_interval(mut self, interval: std::time::Duration) -> Self {
        self.request_interval = interval;
        self
    }
}

/// Extracts the films listed on one day's showtimes page.
pub fn parse_day(html: &str, day: NaiveDate) -> ProviderResult<Vec<RawShowing>> {
    let doc = Html::parse_document(html);
    let card_sel = selector("div.film-card")?;
    let link_sel = selector("a.film-card__link")?;
    let title_sel = selector(".film-card__title")?;
    let excerpt_sel = selector(".film-card__excerpt")?;

    let mut raws = Vec::new();
    for card in doc.select(&card_sel) {
        let Some(link) = card.select(&link_sel).next() else {
            debug!(source = NAME, %day, "film card without link");
            continue;
        };
        let Some(href) = link.value().attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
            warn!(source = NAME, %day, "skipping film card without href");
            continue;
        };
        let title = card
            .select(&title_sel)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| element_text(link));
        let excerpt = card.select(&excerpt_sel).next().map(element_text);

        raws.push(
            RawShowing::new(href, day, title)
                .with_url(href)
                .with_excerpt_opt(excerpt),
        );
    }
    Ok(raws)
}

/// Coolidge Corner provider.
pub struct CoolidgeProvider {
    config: CoolidgeConfig,
    http: HttpClient,
    cache: DailyCache,
    throttle: Throttle,
    base: Url,
}

impl CoolidgeProvider {
    /// Creates a new provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the showtimes URL does not parse.
    pub fn new(config: CoolidgeConfig, http: HttpClient, cache: DailyCache) -> ProviderResult<Self> {
        let base = parse_url(NAME, &config.showtimes_url)?;
        let throttle = Throttle::new(config.request_interval);
        Ok(Self {
            config,
            http,
            cache,
            throttle,
            base,
        })
    }

    fn cache_key(day: NaiveDate) -> CacheKey {
        CacheKey::new(NAME).with_qualifier(format!("day-{}", day.format("%Y-%m-%d")))
    }

    fn day_url(&self, day: NaiveDate) -> String {
        format!("{}?date={}", self.config.showtimes_url, day.format("%Y-%m-%d"))
    }

    async fn download_day(&self, day: NaiveDate) -> ProviderResult<SourceResult> {
        self.throttle.wait().await;
        let html = self.http.get_text(&self.day_url(day)).await?;
        let raws = parse_day(&html, day)?;
        Ok(build_source_result(NAME, raws, &DateRange::single(day), &self.base))
    }

    async fn day(&self, day: NaiveDate) -> ProviderResult<SourceResult> {
        self.cache
            .get_or_compute(&Self::cache_key(day), || self.download_day(day))
            .await
    }
}

impl ShowingProvider for CoolidgeProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Html
    }

    fn fetch_showings(&self, range: DateRange) -> BoxFuture<'_, ProviderResult<SourceResult>> {
        Box::pin(async move {
            let mut result = SourceResult::new();
            let mut last_error = None;
            let mut succeeded = 0usize;

            for day in range.days() {
                match self.day(day).await {
                    Ok(day_result) => {
                        succeeded += 1;
                        result.extend(day_result);
                    }
                    Err(e) => {
                        warn!(source = NAME, %day, error = %e, "skipping day");
                        last_error = Some(e);
                    }
                }
            }

            if let (0, Some(e)) = (succeeded, last_error) {
                return Err(e.with_provider(NAME));
            }
            result.sort_by_title();
            Ok(result)
        })
    }

    fn invalidate_cache(&self, day: Option<NaiveDate>) -> ProviderResult<()> {
        invalidate_source(&self.cache, NAME, day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::sources::testing::{UNREACHABLE, cache, date, http};
    use kinocal_core::Showing;
    use std::time::Duration;

    const PAGE: &str = r#"
        <html><body><section class="showtimes">
          <div class="film-card">
            <a class="film-card__link" href="/films/paris-texas">
              <h3 class="film-card__title">Paris,   Texas</h3>
            </a>
            <p class="film-card__excerpt">  Wim Wenders' road movie. </p>
          </div>
          <div class="film-card">
            <a class="film-card__link" href="/films/alien">Alien</a>
          </div>
          <div class="film-card">
            <span>Members only</span>
          </div>
          <div class="film-card">
            <a class="film-card__link" href="">Untitled</a>
          </div>
        </section></body></html>"#;

    fn provider(cache: DailyCache) -> CoolidgeProvider {
        let config = CoolidgeConfig::default()
            .with_showtimes_url(UNREACHABLE)
            .with_request_interval(Duration::ZERO);
        CoolidgeProvider::new(config, http(), cache).unwrap()
    }

    fn stored(day: NaiveDate, titles: &[&str]) -> SourceResult {
        titles
            .iter()
            .map(|t| Showing::new(day, *t, format!("https://coolidge.org/films/{}", t.to_lowercase())))
            .collect()
    }

    #[test]
    fn parses_cards_with_title_and_excerpt() {
        let day = date(2025, 1, 5);
        let raws = parse_day(PAGE, day).unwrap();
        assert_eq!(raws.len(), 2);
        assert_eq!(raws[0].title, "Paris, Texas");
        assert_eq!(raws[0].excerpt.as_deref(), Some("Wim Wenders' road movie."));
        assert_eq!(raws[1].title, "Alien");
        assert_eq!(raws[1].excerpt, None);
        assert!(raws.iter().all(|r| r.date == day));
    }

    #[test]
    fn day_results_resolve_against_the_site() {
        let base = Url::parse("https://coolidge.org/showtimes").unwrap();
        let day = date(2025, 1, 5);
        let result = build_source_result(NAME, parse_day(PAGE, day).unwrap(), &DateRange::single(day), &base);
        let urls: Vec<_> = result.get(day).unwrap().iter().map(Showing::url).collect();
        assert_eq!(
            urls,
            vec!["https://coolidge.org/films/alien", "https://coolidge.org/films/paris-texas"]
        );
    }

    #[tokio::test]
    async fn missing_days_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir, date(2025, 1, 5));
        cache
            .put(&CoolidgeProvider::cache_key(date(2025, 1, 5)), &stored(date(2025, 1, 5), &["Vertigo", "alien"]))
            .unwrap();
        cache
            .put(&CoolidgeProvider::cache_key(date(2025, 1, 7)), &stored(date(2025, 1, 7), &["Rope"]))
            .unwrap();

        let provider = provider(cache);
        let range = DateRange::new(date(2025, 1, 5), date(2025, 1, 7)).unwrap();
        let result = provider.fetch_showings(range).await.unwrap();

        assert_eq!(result.dates().collect::<Vec<_>>(), vec![date(2025, 1, 5), date(2025, 1, 7)]);
        let titles: Vec<_> = result.get(date(2025, 1, 5)).unwrap().iter().map(Showing::title).collect();
        assert_eq!(titles, vec!["alien", "Vertigo"]);
    }

    #[tokio::test]
    async fn all_days_failing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(cache(&dir, date(2025, 1, 5)));
        let err = provider
            .fetch_showings(DateRange::single(date(2025, 1, 5)))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err.code(), ProviderErrorCode::NetworkError | ProviderErrorCode::Timeout));
        assert_eq!(err.provider(), Some(NAME));
    }
}
