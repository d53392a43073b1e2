//! Landmark Theatres, via the BoxOffice schedule API.
//!
//! Two calls per range: a schedule POST that maps film ids to dates and
//! ticketing links, then a movie-details GET for titles and synopses. The
//! ticketing link goes straight to checkout, so each film's readable page on
//! the Landmark site is probed first and preferred when it exists. The
//! normalized result is cached per theater and requested range.

use std::collections::HashMap;

use chrono::NaiveDate;
use kinocal_core::{DateRange, SourceResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheKey, DailyCache};
use crate::error::{NormalizeError, ProviderError, ProviderResult};
use crate::http::HttpClient;
use crate::normalize::build_source_result;
use crate::probe::UrlProbe;
use crate::provider::{BoxFuture, ShowingProvider, SourceKind};
use crate::raw_showing::RawShowing;

use super::{decode_each, id_string, invalidate_source, parse_url, range_qualifier};

/// Source name and cache namespace.
pub const NAME: &str = "landmark";

/// Landmark configuration.
#[derive(Debug, Clone)]
pub struct LandmarkConfig {
    /// Site root; film pages live under `movies/`.
    pub site_url: String,
    /// Schedule endpoint (POST).
    pub schedule_url: String,
    /// Movie details endpoint (GET).
    pub movies_url: String,
    /// BoxOffice theater id.
    pub theater_id: String,
    /// IANA zone the theater publishes dates in.
    pub time_zone: String,
    /// Whether to look for readable film pages before falling back to
    /// ticketing links.
    pub probe_film_pages: bool,
}

impl LandmarkConfig {
    /// Kendall Square Cinema.
    pub const DEFAULT_THEATER_ID: &'static str = "X019B";

    /// Points every endpoint at another host (used by tests and mirrors).
    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        let site_url = site_url.into();
        let root = site_url.trim_end_matches('/');
        self.schedule_url = format!("{}/api/gatsby-source-boxofficeapi/schedule", root);
        self.movies_url = format!("{}/api/gatsby-source-boxofficeapi/movies", root);
        self.site_url = format!("{}/", root);
        self
    }

    /// Selects another theater.
    pub fn with_theater(mut self, theater_id: impl Into<String>) -> Self {
        self.theater_id = theater_id.into();
        self
    }

    /// Enables or disables film page probing.
    pub fn with_film_page_probing(mut self, enabled: bool) -> Self {
        self.probe_film_pages = enabled;
        self
    }
}

impl Default for LandmarkConfig {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            schedule_url: String::new(),
            movies_url: String::new(),
            theater_id: Self::DEFAULT_THEATER_ID.to_string(),
            time_zone: "America/New_York".to_string(),
            probe_film_pages: true,
        }
        .with_site_url("https://www.landmarktheatres.com/")
    }
}

#[derive(Debug, Serialize)]
struct ScheduleRequest<'a> {
    theaters: [TheaterRef<'a>; 1],
    from: String,
    to: String,
    nin: Vec<String>,
    sin: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TheaterRef<'a> {
    id: &'a str,
    time_zone: &'a str,
}

/// One film on one date, as listed by the schedule call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledFilm {
    pub film_id: String,
    pub date: NaiveDate,
    pub ticketing_url: Option<String>,
}

/// Title and synopsis from the movie details call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilmDetails {
    pub title: String,
    pub synopsis: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovieRecord {
    id: Value,
    title: String,
    #[serde(default)]
    locale: Option<MovieLocale>,
}

#[derive(Debug, Deserialize)]
struct MovieLocale {
    #[serde(default)]
    synopsis: Option<String>,
}

/// Reads `<theater>.schedule.<film id>.<date>` out of a schedule response.
///
/// # Errors
///
/// Fails with `InvalidResponse` if the theater's schedule object is missing.
pub fn parse_schedule(payload: &Value, theater_id: &str) -> ProviderResult<Vec<ScheduledFilm>> {
    let schedule = payload
        .get(theater_id)
        .and_then(|theater| theater.get("schedule"))
        .and_then(Value::as_object)
        .ok_or_else(|| {
            ProviderError::invalid_response(format!("no schedule for theater {}", theater_id))
                .with_provider(NAME)
        })?;

    let mut films = Vec::new();
    for (film_id, by_date) in schedule {
        let Some(by_date) = by_date.as_object() else {
            warn!(source = NAME, identity = %film_id, "skipping film without dated schedule");
            continue;
        };
        for (raw_date, presentations) in by_date {
            let Ok(date) = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d") else {
                let e = NormalizeError::UnparseableDate {
                    identity: film_id.clone(),
                    raw: raw_date.clone(),
                };
                warn!(source = NAME, identity = %film_id, error = %e, "skipping schedule entry");
                continue;
            };
            films.push(ScheduledFilm {
                film_id: film_id.clone(),
                date,
                ticketing_url: first_ticketing_url(presentations),
            });
        }
    }
    Ok(films)
}

/// The first ticketing link of a date's presentations. The API has served
/// both a single object and a list of objects here.
fn first_ticketing_url(presentations: &Value) -> Option<String> {
    let first = match presentations {
        Value::Array(items) => items.first()?,
        other => other,
    };
    first
        .pointer("/data/ticketing/0/urls/0")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Indexes a movie details response by film id.
///
/// # Errors
///
/// Fails with `InvalidResponse` if the payload is not an array.
pub fn parse_movies(payload: Value) -> ProviderResult<HashMap<String, FilmDetails>> {
    let Value::Array(records) = payload else {
        return Err(ProviderError::invalid_response("expected an array of movies").with_provider(NAME));
    };
    Ok(decode_each::<MovieRecord>(NAME, "movie", records)
        .into_iter()
        .filter_map(|movie| {
            let id = id_string(&movie.id)?;
            let synopsis = movie.locale.and_then(|l| l.synopsis);
            Some((
                id,
                FilmDetails {
                    title: movie.title,
                    synopsis,
                },
            ))
        })
        .collect())
}

/// Film page address guessed from id and title: `movies/<id>-<Title-With-Dashes>`.
pub fn film_page_candidate(site: &Url, film_id: &str, title: &str) -> Option<String> {
    let slug = format!("{}-{}", film_id, title.trim().replace(' ', "-"));
    site.join(&format!("movies/{}", slug)).ok().map(String::from)
}

/// Landmark provider.
pub struct LandmarkProvider {
    config: LandmarkConfig,
    http: HttpClient,
    cache: DailyCache,
    probe: UrlProbe,
    site: Url,
}

impl LandmarkProvider {
    /// Creates a new provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configured URLs do not parse.
    pub fn new(config: LandmarkConfig, http: HttpClient, cache: DailyCache) -> ProviderResult<Self> {
        let site = parse_url(NAME, &config.site_url)?;
        parse_url(NAME, &config.schedule_url)?;
        parse_url(NAME, &config.movies_url)?;
        Ok(Self {
            probe: UrlProbe::new(http.clone()),
            config,
            http,
            cache,
            site,
        })
    }

    fn cache_key(&self, range: &DateRange) -> CacheKey {
        let links = if self.config.probe_film_pages { "" } else { "-ticketing" };
        CacheKey::new(NAME).with_qualifier(format!(
            "{}-{}{}",
            self.config.theater_id,
            range_qualifier(range),
            links
        ))
    }

    async fn download(&self, range: DateRange) -> ProviderResult<SourceResult> {
        let request = ScheduleRequest {
            theaters: [TheaterRef {
                id: &self.config.theater_id,
                time_zone: &self.config.time_zone,
            }],
            from: range.from().to_string(),
            to: range.to().to_string(),
            nin: Vec::new(),
            sin: Vec::new(),
        };
        let body = self.http.post_json_text(&self.config.schedule_url, &request).await?;
        let scheduled = parse_schedule(&serde_json::from_str(&body)?, &self.config.theater_id)?;

        let details = if scheduled.is_empty() {
            HashMap::new()
        } else {
            let body = self.http.get_text(&self.movies_url(&scheduled)).await?;
            parse_movies(serde_json::from_str(&body)?)?
        };

        let mut raws = Vec::with_capacity(scheduled.len());
        for film in scheduled {
            let Some(detail) = details.get(&film.film_id) else {
                let e = NormalizeError::DanglingReference {
                    identity: film.film_id,
                    date: film.date,
                    what: "movie details".to_string(),
                };
                warn!(source = NAME, date = %film.date, identity = %e.identity(), error = %e, "skipping film");
                continue;
            };

            let url = match self.film_page(&film.film_id, &detail.title).await {
                Some(page) => Some(page),
                None => film.ticketing_url,
            };
            let mut raw = RawShowing::new(film.film_id, film.date, detail.title.as_str())
                .with_excerpt_opt(detail.synopsis.as_deref());
            if let Some(url) = url {
                raw = raw.with_url(url);
            }
            raws.push(raw);
        }

        Ok(build_source_result(NAME, raws, &range, &self.site))
    }

    fn movies_url(&self, scheduled: &[ScheduledFilm]) -> String {
        let mut ids: Vec<&str> = scheduled.iter().map(|f| f.film_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        let mut url = format!("{}?basic=false&castingLimit=3", self.config.movies_url);
        for id in ids {
            url.push_str("&ids=");
            url.push_str(&urlencoding::encode(id));
        }
        url
    }

    async fn film_page(&self, film_id: &str, title: &str) -> Option<String> {
        if !self.config.probe_film_pages {
            return None;
        }
        let candidate = film_page_candidate(&self.site, film_id, title)?;
        self.probe.resolve(title, film_id, &candidate).await
    }
}

impl ShowingProvider for LandmarkProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Json
    }

    fn fetch_showings(&self, range: DateRange) -> BoxFuture<'_, ProviderResult<SourceResult>> {
        Box::pin(async move {
            let result = self
                .cache
                .get_or_compute(&self.cache_key(&range), || self.download(range))
                .await
                .map_err(|e| e.with_provider(NAME))?;
            debug!(source = NAME, range = %range, showings = result.total_showings(), "fetched");
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
    use serde_json::json;

    fn schedule_fixture() -> Value {
        json!({
            "X019B": {
                "schedule": {
                    "101": {
                        "2025-01-05": [{"data": {"ticketing": [{"urls": ["https://tickets.example.com/101/a"]}]}}],
                        "2025-01-06": {"data": {"ticketing": [{"urls": ["https://tickets.example.com/101/b"]}]}}
                    },
                    "202": {
                        "2025-01-05": [{"data": {}}],
                        "someday": []
                    }
                }
            }
        })
    }

    #[test]
    fn parses_schedule_in_both_shapes() {
        let mut films = parse_schedule(&schedule_fixture(), "X019B").unwrap();
        films.sort_by(|a, b| (&a.film_id, a.date).cmp(&(&b.film_id, b.date)));
        assert_eq!(films.len(), 3);
        assert_eq!(films[0].ticketing_url.as_deref(), Some("https://tickets.example.com/101/a"));
        assert_eq!(films[1].ticketing_url.as_deref(), Some("https://tickets.example.com/101/b"));
        assert_eq!(films[2].film_id, "202");
        assert_eq!(films[2].ticketing_url, None);
    }

    #[test]
    fn unknown_theater_is_invalid_response() {
        let err = parse_schedule(&schedule_fixture(), "X999").unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
    }

    #[test]
    fn parses_movie_details() {
        let details = parse_movies(json!([
            {"id": "101", "title": "Perfect Days", "locale": {"synopsis": "A toilet cleaner in Tokyo."}},
            {"id": 202, "title": "Anora"},
            {"title": "no id"}
        ]))
        .unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details["101"].synopsis.as_deref(), Some("A toilet cleaner in Tokyo."));
        assert_eq!(details["202"].title, "Anora");
    }

    #[test]
    fn film_page_candidate_dashes_title() {
        let site = Url::parse("https://www.landmarktheatres.com/").unwrap();
        assert_eq!(
            film_page_candidate(&site, "101", " Perfect Days ").as_deref(),
            Some("https://www.landmarktheatres.com/movies/101-Perfect-Days")
        );
    }

    #[test]
    fn movies_url_lists_each_id_once() {
        let dir = tempfile::tempdir().unwrap();
        let provider =
            LandmarkProvider::new(LandmarkConfig::default(), http(), cache(&dir, date(2025, 1, 5))).unwrap();
        let scheduled: Vec<_> = ["202", "101", "202"]
            .into_iter()
            .map(|id| ScheduledFilm {
                film_id: id.to_string(),
                date: date(2025, 1, 5),
                ticketing_url: None,
            })
            .collect();
        assert_eq!(
            provider.movies_url(&scheduled),
            "https://www.landmarktheatres.com/api/gatsby-source-boxofficeapi/movies?basic=false&castingLimit=3&ids=101&ids=202"
        );
    }

    #[tokio::test]
    async fn falls_back_to_ticketing_url_when_film_page_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let config = LandmarkConfig::default().with_site_url(UNREACHABLE);
        let provider = LandmarkProvider::new(config, http(), cache(&dir, date(2025, 1, 5))).unwrap();

        assert_eq!(provider.film_page("101", "Perfect Days").await, None);
        assert_eq!(provider.probe.remembered("Perfect Days", "101"), None);
    }

    #[tokio::test]
    async fn theaters_do_not_share_an_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir, date(2025, 1, 5));
        let range = DateRange::week_starting(date(2025, 1, 5));
        let provider = |config: LandmarkConfig| {
            LandmarkProvider::new(config.with_site_url(UNREACHABLE), http(), cache.clone()).unwrap()
        };
        let kendall = provider(LandmarkConfig::default());
        let other = provider(LandmarkConfig::default().with_theater("X00AB"));
        let ticketing_only = provider(LandmarkConfig::default().with_film_page_probing(false));

        assert_ne!(kendall.cache_key(&range), other.cache_key(&range));
        assert_ne!(kendall.cache_key(&range), ticketing_only.cache_key(&range));

        let stored: SourceResult = std::iter::once(Showing::new(
            date(2025, 1, 5),
            "Perfect Days",
            "https://tickets.example.com/101/a",
        ))
        .collect();
        cache.put(&kendall.cache_key(&range), &stored).unwrap();
        assert_eq!(kendall.fetch_showings(range).await.unwrap(), stored);
        assert!(other.fetch_showings(range).await.is_err());
    }

    #[tokio::test]
    async fn cached_result_is_served_per_range() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir, date(2025, 1, 5));
        let range = DateRange::week_starting(date(2025, 1, 5));

        let stored: SourceResult = std::iter::once(
            Showing::new(date(2025, 1, 5), "Perfect Days", "https://tickets.example.com/101/a")
                .with_excerpt("A toilet cleaner in Tokyo."),
        )
        .collect();
        let config = LandmarkConfig::default().with_site_url(UNREACHABLE);
        let provider = LandmarkProvider::new(config, http(), cache.clone()).unwrap();
        cache.put(&provider.cache_key(&range), &stored).unwrap();
        let first = provider.fetch_showings(range).await.unwrap();
        let second = provider.fetch_showings(range).await.unwrap();
        assert_eq!(first, stored);
        assert_eq!(first, second);

        // A different range is a different entry: the network is needed.
        let other = DateRange::week_starting(date(2025, 1, 6));
        assert!(provider.fetch_showings(other).await.is_err());
    }
}
