//! Somerville Theatre, via the Veezi web-session API.
//!
//! The API returns every upcoming session as a flat JSON array and requires an
//! access token in the `VeeziAccessToken` header. The array is cached once per
//! day; anything else (Veezi answers some auth failures with a 200 and a
//! message object) is rejected before it reaches the cache.

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
pub const NAME: &str = "somerville";

const TOKEN_HEADER: &str = "VeeziAccessToken";

/// Somerville Theatre configuration.
#[derive(Clone)]
pub struct SomervilleConfig {
    /// Web-session endpoint.
    pub websession_url: String,
    /// Veezi access token, already resolved from wherever it is stored.
    pub token: String,
}

impl std::fmt::Debug for SomervilleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SomervilleConfig")
            .field("websession_url", &self.websession_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl SomervilleConfig {
    /// Default Veezi endpoint.
    pub const DEFAULT_WEBSESSION_URL: &'static str = "https://api.us.veezi.com/v1/websession";

    pub fn new(token: impl Into<String>) -> Self {
        Self {
            websession_url: Self::DEFAULT_WEBSESSION_URL.to_string(),
            token: token.into(),
        }
    }

    /// Overrides the endpoint.
    pub fn with_websession_url(mut self, url: impl Into<String>) -> Self {
        self.websession_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WebSession {
    film_id: Value,
    feature_start_time: String,
    title: String,
    #[serde(default)]
    url: Option<String>,
}

/// Extracts one raw showing per web session.
///
/// # Errors
///
/// Fails with `InvalidResponse` if the payload is not an array.
pub fn parse_websessions(payload: &Value) -> ProviderResult<Vec<RawShowing>> {
    let records = session_records(payload)?;
    let sessions = decode_each::<WebSession>(NAME, "web session", records.to_vec());
    let mut raws = Vec::with_capacity(sessions.len());
    for session in sessions {
        let Some(film_id) = id_string(&session.film_id) else {
            warn!(source = NAME, title = %session.title, "skipping session without film id");
            continue;
        };
        let Some(date) = parse_local_date(&session.feature_start_time) else {
            let e = NormalizeError::UnparseableDate {
                identity: film_id,
                raw: session.feature_start_time,
            };
            warn!(source = NAME, identity = %e.identity(), error = %e, "skipping session");
            continue;
        };

        let mut raw = RawShowing::new(film_id, date, session.title);
        if let Some(url) = session.url {
            raw = raw.with_url(url);
        }
        raws.push(raw);
    }

    debug!(source = NAME, sessions = raws.len(), "parsed web sessions");
    Ok(raws)
}

fn session_records(payload: &Value) -> ProviderResult<&[Value]> {
    match payload {
        Value::Array(records) => Ok(records),
        _ => Err(ProviderError::invalid_response("expected an array of web sessions").with_provider(NAME)),
    }
}

/// Somerville Theatre provider.
pub struct SomervilleProvider {
    config: SomervilleConfig,
    http: HttpClient,
    cache: DailyCache,
    base: Url,
}

impl SomervilleProvider {
    /// Creates a new provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the token is empty or the endpoint
    /// does not parse.
    pub fn new(config: SomervilleConfig, http: HttpClient, cache: DailyCache) -> ProviderResult<Self> {
        if config.token.trim().is_empty() {
            return Err(
                ProviderError::configuration("no Veezi access token configured").with_provider(NAME),
            );
        }
        let base = parse_url(NAME, &config.websession_url)?;
        Ok(Self {
            config,
            http,
            cache,
            base,
        })
    }

    fn cache_key() -> CacheKey {
        CacheKey::new(NAME).with_qualifier("websession")
    }

    async fn download(&self) -> ProviderResult<Value> {
        let body = self
            .http
            .get_text_with_headers(
                &self.config.websession_url,
                &[(TOKEN_HEADER, self.config.token.trim())],
            )
            .await?;
        let payload = serde_json::from_str(&body)?;
        session_records(&payload)?;
        Ok(payload)
    }
}

impl ShowingProvider for SomervilleProvider {
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
                .get_or_compute(&Self::cache_key(), || self.download())
                .await
                .map_err(|e| e.with_provider(NAME))?;
            let raws = parse_websessions(&payload)?;
            Ok(build_source_result(NAME, raws, &range, &self.base))
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
    use crate::sources::testing::{UNREACHABLE, cache, date, http, serve_in_order};
    use serde_json::json;

    fn fixture() -> Value {
        json!([
            {"FilmId": "ST00001234", "FeatureStartTime": "2025-01-05T19:30:00",
             "Title": "The Seventh Seal", "Url": "https://ticketing.us.veezi.com/purchase/1"},
            {"FilmId": "ST00001234", "FeatureStartTime": "2025-01-05T21:45:00",
             "Title": "The Seventh Seal", "Url": "https://ticketing.us.veezi.com/purchase/2"},
            {"FilmId": "ST00005678", "FeatureStartTime": "2025-01-05T20:00:00",
             "Title": "aguirre, the wrath of god", "Url": "https://ticketing.us.veezi.com/purchase/3"},
            {"FilmId": "ST00001234", "FeatureStartTime": "2025-01-12T19:30:00",
             "Title": "The Seventh Seal", "Url": "https://ticketing.us.veezi.com/purchase/4"},
            {"FilmId": "ST00009999", "FeatureStartTime": "TBA", "Title": "Mystery", "Url": "x"}
        ])
    }

    #[test]
    fn parses_sessions() {
        let raws = parse_websessions(&fixture()).unwrap();
        assert_eq!(raws.len(), 4);
        assert_eq!(raws[0].identity, "ST00001234");
        assert_eq!(raws[0].date, date(2025, 1, 5));
    }

    #[test]
    fn object_payload_is_invalid_response() {
        let err = parse_websessions(&json!({"Message": "Authorization has been denied"})).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
    }

    #[test]
    fn missing_token_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = SomervilleProvider::new(SomervilleConfig::new("  "), http(), cache(&dir, date(2025, 1, 5)));
        let err = result.err().unwrap();
        assert!(err.is_configuration());
        assert_eq!(err.provider(), Some(NAME));
    }

    #[test]
    fn token_is_redacted_in_debug_output() {
        let config = SomervilleConfig::new("s3cret");
        assert!(!format!("{:?}", config).contains("s3cret"));
    }

    #[tokio::test]
    async fn cached_payload_is_filtered_deduplicated_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir, date(2025, 1, 5));
        cache.put(&SomervilleProvider::cache_key(), &fixture()).unwrap();

        let config = SomervilleConfig::new("token").with_websession_url(UNREACHABLE);
        let provider = SomervilleProvider::new(config, http(), cache).unwrap();

        let range = DateRange::week_starting(date(2025, 1, 5));
        let first = provider.fetch_showings(range).await.unwrap();
        let second = provider.fetch_showings(range).await.unwrap();
        assert_eq!(first, second);

        assert_eq!(first.dates().collect::<Vec<_>>(), vec![date(2025, 1, 5)]);
        let day = first.get(date(2025, 1, 5)).unwrap();
        let titles: Vec<_> = day.iter().map(|s| s.title()).collect();
        assert_eq!(titles, vec!["aguirre, the wrath of god", "The Seventh Seal"]);
        assert_eq!(day[1].url(), "https://ticketing.us.veezi.com/purchase/1");
    }

    #[tokio::test]
    async fn denied_message_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir, date(2025, 1, 5));
        let url = serve_in_order(vec![
            json!({"Message": "Authorization has been denied"}).to_string(),
            fixture().to_string(),
        ]);
        let config = SomervilleConfig::new("token").with_websession_url(url);
        let provider = SomervilleProvider::new(config, http(), cache.clone()).unwrap();
        let range = DateRange::single(date(2025, 1, 5));

        let err = provider.fetch_showings(range).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
        assert!(cache.get::<Value>(&SomervilleProvider::cache_key()).is_none());

        let result = provider.fetch_showings(range).await.unwrap();
        assert_eq!(result.total_showings(), 2);
        assert!(cache.get::<Value>(&SomervilleProvider::cache_key()).is_some());
    }
}
