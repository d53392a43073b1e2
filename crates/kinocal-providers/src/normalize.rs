//! RawShowing to SourceResult pipeline.
//!
//! Every adapter funnels its raw records through [`build_source_result`]:
//!
//! 1. Normalize each record ([`normalize_showing`]): trim the title, resolve
//!    the link against the source's base URL, tidy the excerpt. Records that
//!    fail are logged with their identity and dropped.
//! 2. Collapse repeat screenings: the first record seen for a
//!    `(date, identity)` pair wins.
//! 3. Drop dates outside the requested range. Upstreams routinely return a
//!    whole month or season regardless of what was asked for.
//! 4. Sort each day by title, case-insensitively.

use std::collections::HashSet;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use kinocal_core::{DateRange, Showing, SourceResult};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::NormalizeError;
use crate::raw_showing::RawShowing;

/// Converts one [`RawShowing`] into a [`Showing`].
///
/// # Errors
///
/// Returns a [`NormalizeError`] when the title is blank, the link is missing,
/// or the link cannot be resolved to an absolute URL.
pub fn normalize_showing(raw: &RawShowing, base: &Url) -> Result<Showing, NormalizeError> {
    let title = collapse_whitespace(&raw.title);
    if title.is_empty() {
        return Err(NormalizeError::EmptyTitle {
            identity: raw.identity.clone(),
        });
    }

    let href = raw.url.as_deref().map(str::trim).unwrap_or_default();
    if href.is_empty() {
        return Err(NormalizeError::MissingUrl {
            identity: raw.identity.clone(),
        });
    }
    let url = resolve_href(base, href).ok_or_else(|| NormalizeError::InvalidUrl {
        identity: raw.identity.clone(),
        url: href.to_string(),
    })?;

    let showing = Showing::new(raw.date, title, url);
    let excerpt = raw
        .excerpt
        .as_deref()
        .map(collapse_whitespace)
        .filter(|e| !e.is_empty());
    Ok(match excerpt {
        Some(excerpt) => showing.with_excerpt(excerpt),
        None => showing,
    })
}

/// Runs the full pipeline over one source's raw records.
///
/// `source` is only used for log context.
pub fn build_source_result<I>(source: &str, raws: I, range: &DateRange, base: &Url) -> SourceResult
where
    I: IntoIterator<Item = RawShowing>,
{
    let mut seen = HashSet::new();
    let mut result = SourceResult::new();
    let mut skipped = 0usize;
    let mut duplicates = 0usize;
    let mut out_of_range = 0usize;

    for raw in raws {
        if !range.contains(raw.date) {
            trace!(source, date = %raw.date, identity = %raw.identity, "outside requested range");
            out_of_range += 1;
            continue;
        }

        let showing = match normalize_showing(&raw, base) {
            Ok(showing) => showing,
            Err(e) => {
                warn!(source, date = %raw.date, identity = %e.identity(), error = %e, "skipping record");
                skipped += 1;
                continue;
            }
        };

        if !seen.insert((raw.date, raw.identity)) {
            duplicates += 1;
            continue;
        }

        result.push(showing);
    }

    result.sort_by_title();

    debug!(
        source,
        days = result.len_days(),
        showings = result.total_showings(),
        skipped,
        duplicates,
        out_of_range,
        "normalized source result"
    );
    result
}

/// Resolves a possibly relative link against the source's base URL.
pub fn resolve_href(base: &Url, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        Url::parse(href).ok().map(String::from)
    } else {
        base.join(href).ok().map(String::from)
    }
}

/// Parses the calendar date out of a timestamp string as published.
///
/// The date is taken as written: `2025-01-05T23:30:00-05:00` is January 5th
/// even though it is January 6th in UTC. Accepts RFC 3339, naive
/// date-times (with `T` or a space, with or without seconds) and plain dates.
pub fn parse_local_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// The local calendar date of a Unix timestamp (seconds).
pub fn date_from_unix(secs: i64) -> Option<NaiveDate> {
    Local
        .timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.date_naive())
}

/// Trims and collapses internal runs of whitespace to single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://cinema.example.com/calendar/").unwrap()
    }

    fn titles(result: &SourceResult, day: NaiveDate) -> Vec<&str> {
        result
            .get(day)
            .unwrap_or_default()
            .iter()
            .map(Showing::title)
            .collect()
    }

    mod normalize_showing {
        use super::*;

        #[test]
        fn trims_and_resolves() {
            let raw = RawShowing::new("f1", date(2025, 1, 5), "  The   Third Man \n")
                .with_url("/films/third-man")
                .with_excerpt("  Vienna,\n 1948 ");
            let showing = normalize_showing(&raw, &base()).unwrap();
            assert_eq!(showing.title(), "The Third Man");
            assert_eq!(showing.url(), "https://cinema.example.com/films/third-man");
            assert_eq!(showing.excerpt(), Some("Vienna, 1948"));
        }

        #[test]
        fn absolute_url_kept() {
            let raw = RawShowing::new("f1", date(2025, 1, 5), "M")
                .with_url("https://tickets.example.org/m?session=1");
            let showing = normalize_showing(&raw, &base()).unwrap();
            assert_eq!(showing.url(), "https://tickets.example.org/m?session=1");
        }

        #[test]
        fn relative_path_without_slash_joins_base() {
            let raw = RawShowing::new("f1", date(2025, 1, 5), "M").with_url("m.html");
            let showing = normalize_showing(&raw, &base()).unwrap();
            assert_eq!(showing.url(), "https://cinema.example.com/calendar/m.html");
        }

        #[test]
        fn empty_title_rejected() {
            let raw = RawShowing::new("f1", date(2025, 1, 5), "   ").with_url("/x");
            assert_eq!(
                normalize_showing(&raw, &base()),
                Err(NormalizeError::EmptyTitle {
                    identity: "f1".into()
                })
            );
        }

        #[test]
        fn missing_url_rejected() {
            let raw = RawShowing::new("f2", date(2025, 1, 5), "M");
            assert!(matches!(
                normalize_showing(&raw, &base()),
                Err(NormalizeError::MissingUrl { .. })
            ));
        }

        #[test]
        fn invalid_absolute_url_rejected() {
            let raw = RawShowing::new("f3", date(2025, 1, 5), "M").with_url("http://");
            assert!(matches!(
                normalize_showing(&raw, &base()),
                Err(NormalizeError::InvalidUrl { .. })
            ));
        }
    }

    mod pipeline {
        use super::*;

        #[test]
        fn same_identity_same_day_collapses_first_wins() {
            let day = date(2025, 1, 5);
            let raws = vec![
                RawShowing::new("alien", day, "Alien").with_url("/alien?s=1"),
                RawShowing::new("alien", day, "ALIEN").with_url("/alien?s=2"),
                RawShowing::new("alien", date(2025, 1, 6), "Alien").with_url("/alien?s=3"),
            ];
            let range = DateRange::week_starting(day);
            let result = build_source_result("test", raws, &range, &base());

            let first = result.get(day).unwrap();
            assert_eq!(first.len(), 1);
            assert_eq!(first[0].title(), "Alien");
            assert_eq!(first[0].url(), "https://cinema.example.com/alien?s=1");
            assert_eq!(result.get(date(2025, 1, 6)).unwrap().len(), 1);
        }

        #[test]
        fn distinct_identities_with_colliding_titles_are_kept() {
            let day = date(2025, 1, 5);
            let raws = vec![
                RawShowing::new("solaris-1972", day, "Solaris").with_url("/a"),
                RawShowing::new("solaris-2002", day, "SOLARIS").with_url("/b"),
            ];
            let result = build_source_result("test", raws, &DateRange::single(day), &base());
            assert_eq!(result.get(day).unwrap().len(), 2);
        }

        #[test]
        fn invalid_record_does_not_shadow_later_valid_one() {
            let day = date(2025, 1, 5);
            let raws = vec![
                RawShowing::new("x", day, "").with_url("/x"),
                RawShowing::new("x", day, "Xanadu").with_url("/x"),
            ];
            let result = build_source_result("test", raws, &DateRange::single(day), &base());
            assert_eq!(titles(&result, day), vec!["Xanadu"]);
        }

        #[test]
        fn month_boundary_range_is_filtered_not_extended() {
            let raws = (1..=31).map(|d| {
                RawShowing::new(format!("f{d}"), date(2025, 1, d), format!("Film {d}"))
                    .with_url(format!("/f/{d}"))
            });
            let range = DateRange::new(date(2025, 1, 28), date(2025, 2, 3)).unwrap();
            let result = build_source_result("test", raws, &range, &base());

            let dates: Vec<_> = result.dates().collect();
            assert_eq!(
                dates,
                vec![
                    date(2025, 1, 28),
                    date(2025, 1, 29),
                    date(2025, 1, 30),
                    date(2025, 1, 31)
                ]
            );
        }

        #[test]
        fn days_sorted_case_insensitively() {
            let day = date(2025, 1, 5);
            let raws = ["Zebra", "apple", "Mango"]
                .into_iter()
                .map(|t| RawShowing::new(t, day, t).with_url(format!("/{t}")));
            let result = build_source_result("test", raws, &DateRange::single(day), &base());
            assert_eq!(titles(&result, day), vec!["apple", "Mango", "Zebra"]);
        }

        #[test]
        fn all_records_bad_yields_empty_result() {
            let day = date(2025, 1, 5);
            let raws = vec![RawShowing::new("a", day, "A"), RawShowing::new("b", day, " ")];
            let result = build_source_result("test", raws, &DateRange::single(day), &base());
            assert!(result.is_empty());
        }
    }

    mod dates {
        use super::*;

        #[test]
        fn rfc3339_keeps_published_local_date() {
            assert_eq!(
                parse_local_date("2025-01-05T23:30:00-05:00"),
                Some(date(2025, 1, 5))
            );
            assert_eq!(
                parse_local_date("2025-01-05T01:00:00Z"),
                Some(date(2025, 1, 5))
            );
        }

        #[test]
        fn naive_forms() {
            assert_eq!(parse_local_date("2025-01-05T19:00:00"), Some(date(2025, 1, 5)));
            assert_eq!(parse_local_date("2025-01-05T19:00"), Some(date(2025, 1, 5)));
            assert_eq!(parse_local_date("2025-01-05 19:00:00"), Some(date(2025, 1, 5)));
            assert_eq!(parse_local_date(" 2025-01-05 "), Some(date(2025, 1, 5)));
        }

        #[test]
        fn garbage_is_none() {
            assert_eq!(parse_local_date(""), None);
            assert_eq!(parse_local_date("tomorrow"), None);
            assert_eq!(parse_local_date("2025-13-01"), None);
        }

        #[test]
        fn unix_noon_utc_is_same_day_locally() {
            // 2025-01-05T12:00:00Z; noon UTC is the same date in every
            // populated timezone.
            assert_eq!(date_from_unix(1_736_078_400), Some(date(2025, 1, 5)));
        }
    }

    #[test]
    fn collapse_whitespace_trims() {
        assert_eq!(collapse_whitespace("  a \t b\n\nc "), "a b c");
        assert_eq!(collapse_whitespace("   "), "");
    }
}
