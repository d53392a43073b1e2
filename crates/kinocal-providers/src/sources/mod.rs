//! Concrete cinema sources.
//!
//! Each adapter keeps its upstream's payload shape private: JSON paths and
//! HTML selectors live in a synchronous `parse_*` function that turns a
//! response body into [`RawShowing`]s, and the async
//! [`ShowingProvider::fetch_showings`] wires that parser to the HTTP client,
//! the daily cache and the shared normalization pipeline.
//!
//! | source | kind | cached |
//! |---|---|---|
//! | [`AlamoProvider`] | JSON | raw schedule payload |
//! | [`SomervilleProvider`] | JSON | raw websession payload |
//! | [`LandmarkProvider`] | JSON | normalized result per range |
//! | [`RegentProvider`] | JSON + HTML | raw payload per month |
//! | [`BrattleProvider`] | HTML | normalized coming-soon window |
//! | [`HarvardFilmArchiveProvider`] | HTML | normalized result per range |
//! | [`CoolidgeProvider`] | HTML | normalized result per day |
//!
//! [`RawShowing`]: crate::raw_showing::RawShowing
//! [`ShowingProvider::fetch_showings`]: crate::provider::ShowingProvider::fetch_showings

pub mod alamo;
pub mod brattle;
pub mod coolidge;
pub mod harvard;
pub mod landmark;
pub mod regent;
pub mod somerville;

pub use alamo::{AlamoConfig, AlamoProvider};
pub use brattle::{BrattleConfig, BrattleProvider};
pub use coolidge::{CoolidgeConfig, CoolidgeProvider};
pub use harvard::{HarvardFilmArchiveConfig, HarvardFilmArchiveProvider};
pub use landmark::{LandmarkConfig, LandmarkProvider};
pub use regent::{RegentConfig, RegentProvider};
pub use somerville::{SomervilleConfig, SomervilleProvider};

use chrono::NaiveDate;
use scraper::{ElementRef, Selector};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::cache::DailyCache;
use crate::error::{ProviderError, ProviderResult};
use crate::normalize::collapse_whitespace;

/// Parses a configured endpoint or base URL.
pub(crate) fn parse_url(source: &str, raw: &str) -> ProviderResult<Url> {
    Url::parse(raw).map_err(|e| {
        ProviderError::configuration(format!("invalid URL {:?}: {}", raw, e))
            .with_provider(source)
            .with_source(e)
    })
}

/// Compiles a CSS selector.
pub(crate) fn selector(css: &str) -> ProviderResult<Selector> {
    Selector::parse(css)
        .map_err(|e| ProviderError::internal(format!("invalid selector {:?}: {}", css, e)))
}

/// The element's text content with whitespace collapsed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Renders an id field that upstreams publish as either a string or a number.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Deserializes each record on its own, logging and skipping the ones that
/// do not match the expected shape.
pub(crate) fn decode_each<T: DeserializeOwned>(source: &str, what: &str, records: Vec<Value>) -> Vec<T> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value(record) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(source, index, error = %e, "skipping malformed {}", what);
                None
            }
        })
        .collect()
}

/// Drops every cache entry of `source` stamped with `day`.
pub(crate) fn invalidate_source(
    cache: &DailyCache,
    source: &str,
    day: Option<NaiveDate>,
) -> ProviderResult<()> {
    cache
        .invalidate_namespace(source, day)
        .map(|_| ())
        .map_err(|e| e.with_provider(source))
}

/// Qualifier for entries that depend on the requested range.
pub(crate) fn range_qualifier(range: &kinocal_core::DateRange) -> String {
    format!("range-{}-{}", range.from(), range.to())
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn id_string_accepts_strings_and_numbers() {
        assert_eq!(id_string(&json!("abc")), Some("abc".to_string()));
        assert_eq!(id_string(&json!(42)), Some("42".to_string()));
        assert_eq!(id_string(&json!("  ")), None);
        assert_eq!(id_string(&json!(null)), None);
    }

    #[test]
    fn decode_each_skips_bad_records() {
        #[derive(Deserialize)]
        struct Film {
            title: String,
        }
        let records = vec![json!({"title": "Ran"}), json!({"name": "?"}), json!({"title": "Ikiru"})];
        let films: Vec<Film> = decode_each("test", "film", records);
        let titles: Vec<_> = films.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["Ran", "Ikiru"]);
    }

    #[test]
    fn element_text_collapses_whitespace() {
        let html = scraper::Html::parse_fragment("<p>  The <b>Third</b>\n   Man </p>");
        let p = html.select(&selector("p").unwrap()).next().unwrap();
        assert_eq!(element_text(p), "The Third Man");
    }

    #[test]
    fn bad_urls_are_configuration_errors() {
        let err = parse_url("alamo", "not a url").unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.provider(), Some("alamo"));
    }
}
