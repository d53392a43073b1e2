//! Harvard Film Archive calendar.
//!
//! The calendar page accepts an explicit date window, so one page is fetched
//! per requested range and its normalized result cached under that range.

use chrono::NaiveDate;
use kinocal_core::{DateRange, SourceResult};
use scraper::Html;
use tracing::warn;
use url::Url;

use crate::cache::{CacheKey, DailyCache};
use crate::error::{NormalizeError, ProviderResult};
use crate::http::HttpClient;
use crate::normalize::{build_source_result, parse_local_date};
use crate::provider::{BoxFuture, ShowingProvider, SourceKind};
use crate::raw_showing::RawShowing;

use super::{element_text, invalidate_source, parse_url, range_qualifier, selector};

/// Source name and cache namespace.
pub const NAME: &str = "harvard";

/// Harvard Film Archive configuration.
#[derive(Debug, Clone)]
pub struct HarvardFilmArchiveConfig {
    /// Calendar page; `date_from`/`date_to` are appended.
    pub calendar_url: String,
    /// Base for the relative event links.
    pub site_url: String,
}

impl Default for HarvardFilmArchiveConfig {
    fn default() -> Self {
        Self {
            calendar_url: "https://harvardfilmarchive.org/calendar".to_string(),
            site_url: "https://harvardfilmarchive.org/".to_string(),
        }
    }
}

impl HarvardFilmArchiveConfig {
    /// Overrides the calendar page URL.
    pub fn with_calendar_url(mut self, url: impl Into<String>) -> Self {
        self.calendar_url = url.into();
        self
    }
}

/// Calendar URL for a range; the site expects `MM/DD/YYYY`.
pub fn calendar_url(base: &str, range: &DateRange) -> String {
    let fmt = |d: NaiveDate| d.format("%m/%d/%Y").to_string();
    format!(
        "{}?date_from={}&date_to={}",
        base,
        urlencoding::encode(&fmt(range.from())),
        urlencoding::encode(&fmt(range.to()))
    )
}

/// Extracts one raw showing per calendar event.
pub fn parse_calendar(html: &str) -> ProviderResult<Vec<RawShowing>> {
    let doc = Html::parse_document(html);
    let event_sel = selector("div.event")?;
    let time_sel = selector("div > time[datetime]")?;
    let title_sel = selector(".event__title")?;
    let link_sel = selector("a.event__link")?;

    let mut raws = Vec::new();
    for event in doc.select(&event_sel) {
        let link = event.select(&link_sel).next();
        let href = link
            .and_then(|l| l.value().attr("href"))
            .map(str::trim)
            .unwrap_or_default();
        let title = event.select(&title_sel).next().map(element_text).unwrap_or_default();
        let identity = if href.is_empty() { title.clone() } else { href.to_string() };

        let Some(raw_time) = event.select(&time_sel).next().and_then(|t| t.value().attr("datetime")) else {
            warn!(source = NAME, identity = %identity, "skipping event without time");
            continue;
        };
        let Some(date) = parse_local_date(raw_time) else {
            let e = NormalizeError::UnparseableDate {
                identity,
                raw: raw_time.to_string(),
            };
            warn!(source = NAME, identity = %e.identity(), error = %e, "skipping event");
            continue;
        };

        let mut raw = RawShowing::new(identity, date, title);
        if !href.is_empty() {
            raw = raw.with_url(href);
        }
        raws.push(raw);
    }
    Ok(raws)
}

/// Harvard Film Archive provider.
pub struct HarvardFilmArchiveProvider {
    config: HarvardFilmArchiveConfig,
    http: HttpClient,
    cache: DailyCache,
    base: Url,
}

impl HarvardFilmArchiveProvider {
    /// Creates a new provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configured URLs do not parse.
    pub fn new(
        config: HarvardFilmArchiveConfig,
        http: HttpClient,
        cache: DailyCache,
    ) -> ProviderResult<Self> {
        parse_url(NAME, &config.calendar_url)?;
        let base = parse_url(NAME, &config.site_url)?;
        Ok(Self {
            config,
            http,
            cache,
            base,
        })
    }

    fn cache_key(range: &DateRange) -> CacheKey {
        CacheKey::new(NAME).with_qualifier(range_qualifier(range))
    }

    async fn download(&self, range: DateRange) -> ProviderResult<SourceResult> {
        let html = self
            .http
            .get_text(&calendar_url(&self.config.calendar_url, &range))
            .await?;
        let raws = parse_calendar(&html)?;
        Ok(build_source_result(NAME, raws, &range, &self.base))
    }
}

impl ShowingProvider for HarvardFilmArchiveProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Html
    }

    fn fetch_showings(&self, range: DateRange) -> BoxFuture<'_, ProviderResult<SourceResult>> {
        Box::pin(async move {
            self.cache
                .get_or_compute(&Self::cache_key(&range), || self.download(range))
                .await
                .map_err(|e| e.with_provider(NAME))
        })
    }

    fn invalidate_cache(&self, day: Option<NaiveDate>) -> ProviderResult<()> {
        invalidate_source(&self.cache, NAME, day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{UNREACHABLE, cache, date, http};
    use kinocal_core::Showing;

    const PAGE: &str = r#"
        <html><body><div class="calendar">
          <div class="event event--film">
            <div><time datetime="2025-01-05T19:00:00-05:00">7pm</time></div>
            <h3 class="event__title">Stalker</h3>
            <a class="event__link" href="/film/stalker">More</a>
          </div>
          <div class="event event--film">
            <div><time datetime="2025-01-05T21:30:00-05:00">9:30pm</time></div>
            <h3 class="event__title">Stalker</h3>
            <a class="event__link" href="/film/stalker">More</a>
          </div>
          <div class="event">
            <div><time datetime="2025-01-02T19:00:00-05:00">7pm</time></div>
            <h3 class="event__title">Mirror</h3>
            <a class="event__link" href="/film/mirror">More</a>
          </div>
          <div class="event">
            <h3 class="event__title">Undated Talk</h3>
            <a class="event__link" href="/talk">More</a>
          </div>
          <div class="events-header">not an event</div>
        </div></body></html>"#;

    #[test]
    fn calendar_url_uses_us_dates() {
        let range = DateRange::new(date(2025, 1, 5), date(2025, 1, 11)).unwrap();
        assert_eq!(
            calendar_url("https://harvardfilmarchive.org/calendar", &range),
            "https://harvardfilmarchive.org/calendar?date_from=01%2F05%2F2025&date_to=01%2F11%2F2025"
        );
    }

    #[test]
    fn parses_events() {
        let raws = parse_calendar(PAGE).unwrap();
        assert_eq!(raws.len(), 3);
        assert_eq!(raws[0].identity, "/film/stalker");
        assert_eq!(raws[2].date, date(2025, 1, 2));
    }

    #[test]
    fn pipeline_resolves_links_and_filters_range() {
        let base = Url::parse("https://harvardfilmarchive.org/").unwrap();
        let range = DateRange::week_starting(date(2025, 1, 5));
        let result = build_source_result(NAME, parse_calendar(PAGE).unwrap(), &range, &base);

        assert_eq!(result.dates().collect::<Vec<_>>(), vec![date(2025, 1, 5)]);
        let day = result.get(date(2025, 1, 5)).unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].url(), "https://harvardfilmarchive.org/film/stalker");
    }

    #[tokio::test]
    async fn cached_range_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir, date(2025, 1, 5));
        let range = DateRange::week_starting(date(2025, 1, 5));
        let stored: SourceResult = std::iter::once(Showing::new(
            date(2025, 1, 5),
            "Stalker",
            "https://harvardfilmarchive.org/film/stalker",
        ))
        .collect();
        cache.put(&HarvardFilmArchiveProvider::cache_key(&range), &stored).unwrap();

        let config = HarvardFilmArchiveConfig::default().with_calendar_url(UNREACHABLE);
        let provider = HarvardFilmArchiveProvider::new(config, http(), cache).unwrap();
        assert_eq!(provider.fetch_showings(range).await.unwrap(), stored);
        assert_eq!(provider.fetch_showings(range).await.unwrap(), stored);

        provider.invalidate_cache(None).unwrap();
        assert!(provider.fetch_showings(range).await.is_err());
    }
}
