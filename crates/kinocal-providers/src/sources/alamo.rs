//! Alamo Drafthouse market schedule.
//!
//! One JSON document covers the whole market for the next few weeks:
//! `data.presentations` describes films (keyed by slug) and `data.sessions`
//! lists individual screenings that point back at a presentation. The raw
//! document is cached once per day and filtered to the requested range after
//! the fact. The document is only stored once it has the expected shape, so
//! an error body served with a success status is retried on the next call.

use std::collections::HashMap;

use chrono::NaiveDate;
use kinocal_core::{DateRange, SourceResult};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheKey, DailyCache};
use crate::error::{NormalizeError, ProviderError, ProviderResult};
use crate::http::HttpClient;
use crate::normalize::{build_source_result, parse_local_date};
use crate::provider::{BoxFuture, ShowingProvider, SourceKind};
use crate::raw_showing::RawShowing;

use super::{decode_each, id_string, invalidate_source, parse_url};

/// Source name and cache namespace.
pub const NAME: &str = "alamo";

/// Alamo Drafthouse configuration.
#[derive(Debug, Clone)]
pub struct AlamoConfig {
    /// Market slug; also qualifies the cache entry.
    pub market: String,
    /// Market schedule endpoint.
    pub schedule_url: String,
    /// Prefix of show pages; the presentation slug is appended.
    pub show_url_base: String,
}

impl AlamoConfig {
    /// Default market.
    pub const DEFAULT_MARKET: &'static str = "boston";

    /// Configuration for another Alamo market (e.g. "nyc").
    pub fn for_market(market: &str) -> Self {
        Self {
            market: market.to_string(),
            schedule_url: format!(
                "https://drafthouse.com/s/mother/v2/schedule/market/{}",
                market
            ),
            show_url_base: format!("https://drafthouse.com/{}/show/", market),
        }
    }

    /// Overrides the schedule endpoint.
    pub fn with_schedule_url(mut self, url: impl Into<String>) -> Self {
        self.schedule_url = url.into();
        self
    }
}

impl Default for AlamoConfig {
    fn default() -> Self {
        Self::for_market(Self::DEFAULT_MARKET)
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleDocument {
    data: ScheduleData,
}

#[derive(Debug, Deserialize)]
struct ScheduleData {
    #[serde(default)]
    presentations: Vec<Value>,
    #[serde(default)]
    sessions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Presentation {
    slug: String,
    show: Show,
}

#[derive(Debug, Deserialize)]
struct Show {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    presentation_slug: String,
    show_time_clt: String,
    cinema_id: Value,
    session_id: Value,
}

/// Extracts one raw showing per session from a market schedule document.
///
/// Sessions whose presentation is unknown, or whose start time cannot be
/// read, are logged and skipped.
///
/// # Errors
///
/// Fails with `InvalidResponse` if the document has no `data` object.
pub fn parse_schedule(payload: &Value, show_url_base: &str) -> ProviderResult<Vec<RawShowing>> {
    let document = schedule_document(payload)?;

    let presentations: HashMap<String, String> =
        decode_each::<Presentation>(NAME, "presentation", document.data.presentations)
            .into_iter()
            .map(|p| (p.slug, p.show.title))
            .collect();
    let sessions = decode_each::<Session>(NAME, "session", document.data.sessions);

    let mut raws = Vec::with_capacity(sessions.len());
    for session in sessions {
        let slug = session.presentation_slug;
        let Some(date) = parse_local_date(&session.show_time_clt) else {
            let e = NormalizeError::UnparseableDate {
                identity: slug,
                raw: session.show_time_clt,
            };
            warn!(source = NAME, identity = %e.identity(), error = %e, "skipping session");
            continue;
        };
        let Some(title) = presentations.get(&slug) else {
            let e = NormalizeError::DanglingReference {
                identity: slug,
                date,
                what: "presentation".to_string(),
            };
            warn!(source = NAME, date = %date, identity = %e.identity(), error = %e, "skipping session");
            continue;
        };

        let mut raw = RawShowing::new(slug.as_str(), date, title.as_str());
        if let Some(url) = session_url(show_url_base, &slug, &session.cinema_id, &session.session_id) {
            raw = raw.with_url(url);
        }
        raws.push(raw);
    }

    debug!(source = NAME, presentations = presentations.len(), sessions = raws.len(), "parsed schedule");
    Ok(raws)
}

fn schedule_document(payload: &Value) -> ProviderResult<ScheduleDocument> {
    ScheduleDocument::deserialize(payload).map_err(|e| {
        ProviderError::invalid_response(format!("unexpected schedule shape: {}", e))
            .with_provider(NAME)
    })
}

fn session_url(base: &str, slug: &str, cinema_id: &Value, session_id: &Value) -> Option<String> {
    let cinema_id = id_string(cinema_id)?;
    let mut url = format!("{}{}?cinemaId={}", base, urlencoding::encode(slug), urlencoding::encode(&cinema_id));
    if let Some(session_id) = id_string(session_id) {
        url.push_str("&sessionId=");
        url.push_str(&urlencoding::encode(&session_id));
    }
    Some(url)
}

/// Alamo Drafthouse provider.
pub struct AlamoProvider {
    config: AlamoConfig,
    http: HttpClient,
    cache: DailyCache,
    base: Url,
}

impl AlamoProvider {
    /// Creates a new provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configured URLs do not parse.
    pub fn new(config: AlamoConfig, http: HttpClient, cache: DailyCache) -> ProviderResult<Self> {
        parse_url(NAME, &config.schedule_url)?;
        let base = parse_url(NAME, &config.show_url_base)?;
        Ok(Self {
            config,
            http,
            cache,
            base,
        })
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::new(NAME).with_qualifier(format!("schedule-{}", self.config.market))
    }

    async fn download(&self) -> ProviderResult<Value> {
        let body = self.http.get_text(&self.config.schedule_url).await?;
        let payload = serde_json::from_str(&body)?;
        schedule_document(&payload)?;
        Ok(payload)
    }
}

impl ShowingProvider for AlamoProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Json
    }

    fn fetch_showings(&self, range: DateRange) -> BoxFuture<'_, ProviderResult<SourceResult>> {
        Box::pin(async move {
            let payload = self
                .cache
                .get_or_compute(&self.cache_key(), || self.download())
                .await
                .map_err(|e| e.with_provider(NAME))?;
            let raws = parse_schedule(&payload, &self.config.show_url_base)?;
            Ok(build_source_result(NAME, raws, &range, &self.base))
        })
    }

    fn invalidate_cache(&self, day: Option<NaiveDate>) -> ProviderResult<()> {
        invalidate_source(&self.cache, NAME, day)
    }
}
