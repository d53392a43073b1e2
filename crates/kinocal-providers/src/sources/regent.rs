//! Regent Theatre, via its EventOn calendar plugin.
//!
//! The plugin's AJAX endpoint answers a form POST with a whole month of
//! events: a JSON list (`cals.<calendar>.json`) plus the rendered calendar
//! HTML (`cals.<calendar>.html`). The JSON carries ids, titles and start
//! times; only the HTML carries event tags, which are needed to drop concerts
//! and other non-film events. An event rendered without the film tag is
//! dropped; one that is listed in the JSON but never rendered is kept, since
//! nothing says it is not a film. One raw payload is cached per month touched
//! by the requested range, and only once its calendar object is present.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use kinocal_core::{DateRange, SourceResult};
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheKey, DailyCache};
use crate::error::{NormalizeError, ProviderError, ProviderResult};
use crate::http::HttpClient;
use crate::normalize::{build_source_result, date_from_unix};
use crate::provider::{BoxFuture, ShowingProvider, SourceKind};
use crate::raw_showing::RawShowing;

use super::{decode_each, element_text, id_string, invalidate_source, parse_url, selector};

/// Source name and cache namespace.
pub const NAME: &str = "regent";

/// Regent Theatre configuration.
#[derive(Debug, Clone)]
pub struct RegentConfig {
    /// EventOn AJAX endpoint.
    pub ajax_url: String,
    /// Page every showing links to. Event cards can hold several links
    /// (festivals), so the schedule page is the only reliable target.
    pub schedule_url: String,
    /// EventOn calendar id.
    pub calendar_id: String,
    /// EventOn nonce.
    pub nonce: String,
    /// Tag an event must carry to count as a film.
    pub movie_tag: String,
}

impl Default for RegentConfig {
    fn default() -> Self {
        Self {
            ajax_url: "https://regenttheatre.com/?evo-ajax=eventon_init_load".to_string(),
            schedule_url: "https://regenttheatre.com/schedule/".to_string(),
            calendar_id: "evcal_calendar_685".to_string(),
            nonce: "95e6b2f613".to_string(),
            movie_tag: "movie".to_string(),
        }
    }
}

impl RegentConfig {
    /// Overrides the AJAX endpoint.
    pub fn with_ajax_url(mut self, url: impl Into<String>) -> Self {
        self.ajax_url = url.into();
        self
    }
}

/// Shortcode settings the calendar is rendered with, as `sc[...]` fields.
/// The `fixed_*` and `focus_*` fields are filled in per request.
const SHORTCODE: &[(&str, &str)] = &[
    ("accord", "no"),
    ("bottom_nav", "no"),
    ("cal_id", ""),
    ("cal_init_nonajax", "no"),
    ("calendar_type", "fullcal"),
    ("day_incre", "0"),
    ("ehover", "def"),
    ("ep_fields", ""),
    ("etc_override", "no"),
    ("evc_open", "yes"),
    ("event_count", "0"),
    ("event_location", "all"),
    ("event_order", "ASC"),
    ("event_organizer", "all"),
    ("event_parts", "no"),
    ("event_past_future", "all"),
    ("event_status", "all"),
    ("event_tag", "all"),
    ("event_type", "all"),
    ("event_type_2", "all"),
    ("event_virtual", "all"),
    ("eventtop_date_style", "0"),
    ("eventtop_style", "3"),
    ("exp_jumper", "no"),
    ("exp_so", "no"),
    ("filter_relationship", "AND"),
    ("filter_show_set_only", "no"),
    ("filter_style", "default"),
    ("filter_type", "default"),
    ("filters", "yes"),
    ("ft_event_priority", "no"),
    ("grid_ux", "2"),
    ("heat", "no"),
    ("hide_arrows", "no"),
    ("hide_cancels", "no"),
    ("hide_empty_months", "no"),
    ("hide_end_time", "no"),
    ("hide_et_dn", "no"),
    ("hide_et_extra", "no"),
    ("hide_et_tags", "no"),
    ("hide_et_tl", "no"),
    ("hide_ft", "no"),
    ("hide_ft_img", "no"),
    ("hide_month_headers", "no"),
    ("hide_mult_occur", "no"),
    ("hide_past", "no"),
    ("hide_past_by", "ee"),
    ("hide_so", "no"),
    ("hide_sort_options", "no"),
    ("hover", "numname"),
    ("ics", "no"),
    ("jumper", "yes"),
    ("jumper_count", "5"),
    ("jumper_offset", "0"),
    ("lang", "L1"),
    ("layout_changer", "no"),
    ("livenow_bar", "yes"),
    ("load_fullmonth", "yes"),
    ("mapformat", "roadmap"),
    ("mapiconurl", ""),
    ("maps_load", "yes"),
    ("mapscroll", "true"),
    ("mapzoom", "18"),
    ("members_only", "no"),
    ("ml_priority", "no"),
    ("ml_toend", "no"),
    ("mo1st", ""),
    ("month_incre", "0"),
    ("nexttogrid", "no"),
    ("number_of_months", "1"),
    ("only_ft", "no"),
    ("pec", ""),
    ("s", ""),
    ("search", ""),
    ("search_all", "no"),
    ("sep_month", "no"),
    ("show_et_ft_img", "yes"),
    ("show_limit", "no"),
    ("show_limit_ajax", "no"),
    ("show_limit_paged", "1"),
    ("show_limit_redir", ""),
    ("show_repeats", "no"),
    ("show_search", "no"),
    ("show_upcoming", "0"),
    ("show_year", "no"),
    ("social_share", "no"),
    ("sort_by", "sort_date"),
    ("style", "def"),
    ("tile_bg", "0"),
    ("tile_bg_size", "full"),
    ("tile_count", "2"),
    ("tile_height", "0"),
    ("tile_style", "0"),
    ("tiles", "no"),
    ("ux_val", "0"),
    ("view_switcher", "no"),
    ("wpml_l1", ""),
    ("wpml_l2", ""),
    ("wpml_l3", ""),
    ("yl_priority", "no"),
    ("yl_toend", "no"),
    ("_cver", "4.9.11"),
];

/// Builds the form for one month of the calendar.
pub fn month_form(config: &RegentConfig, year: i32, month: u32) -> Option<Vec<(String, String)>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first
        .checked_add_months(chrono::Months::new(1))?
        .pred_opt()?;
    let unix = |day: NaiveDate| day.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp().to_string());

    let field = |name: &str| format!("cals[{}][sc][{}]", config.calendar_id, name);
    let mut form = Vec::with_capacity(SHORTCODE.len() + 7);
    form.push(("global[calendars][]".to_string(), "EVOFC".to_string()));
    form.extend(SHORTCODE.iter().map(|&(k, v)| (field(k), v.to_string())));
    form.push((field("fixed_day"), first.day().to_string()));
    form.push((field("fixed_month"), first.month().to_string()));
    form.push((field("fixed_year"), first.year().to_string()));
    form.push((field("focus_start_date_range"), unix(first)?));
    form.push((field("focus_end_date_range"), unix(last)?));
    form.push(("nonce".to_string(), config.nonce.clone()));
    Some(form)
}

#[derive(Debug, Deserialize)]
struct CalendarPayload {
    #[serde(default)]
    json: Vec<Value>,
    #[serde(default)]
    html: String,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    event_id: Value,
    event_title: String,
    event_start_unix: i64,
}

/// Ids of events rendered in the calendar without the film tag.
///
/// An event may be rendered several times (once per day it spans); it is a
/// film if any rendering carries the tag.
fn non_film_event_ids(html: &str, movie_tag: &str) -> ProviderResult<HashSet<String>> {
    let doc = Html::parse_fragment(html);
    let event_sel = selector("div[data-time][data-event_id]")?;
    let tag_sel = selector("em[data-tagid]")?;
    let title_sel = selector("span.evoet_title")?;

    let mut films = HashSet::new();
    let mut others = HashSet::new();
    for event in doc.select(&event_sel) {
        let Some(id) = event.value().attr("data-event_id").map(str::trim) else {
            continue;
        };
        let is_film = event.select(&tag_sel).any(|tag| {
            element_text(tag)
                .trim_matches(',')
                .trim()
                .eq_ignore_ascii_case(movie_tag)
        });
        if is_film {
            films.insert(id.to_string());
        } else if others.insert(id.to_string()) {
            let title = event.select(&title_sel).next().map(element_text).unwrap_or_default();
            debug!(source = NAME, identity = %id, title = %title, "not tagged as a film");
        }
    }
    others.retain(|id| !films.contains(id));
    Ok(others)
}

/// Extracts film events from one month's payload.
///
/// # Errors
///
/// Fails with `InvalidResponse` if the calendar object is missing.
pub fn parse_month(payload: &Value, config: &RegentConfig) -> ProviderResult<Vec<RawShowing>> {
    let calendar = calendar_payload(payload, config)?;
    let non_films = non_film_event_ids(&calendar.html, &config.movie_tag)?;

    let mut raws = Vec::new();
    for event in decode_each::<EventRecord>(NAME, "event", calendar.json) {
        let Some(id) = id_string(&event.event_id) else {
            continue;
        };
        if non_films.contains(&id) {
            continue;
        }
        let Some(date) = date_from_unix(event.event_start_unix) else {
            let e = NormalizeError::UnparseableDate {
                identity: id,
                raw: event.event_start_unix.to_string(),
            };
            warn!(source = NAME, identity = %e.identity(), error = %e, "skipping event");
            continue;
        };
        raws.push(RawShowing::new(id, date, event.event_title).with_url(config.schedule_url.as_str()));
    }
    Ok(raws)
}

fn calendar_payload(payload: &Value, config: &RegentConfig) -> ProviderResult<CalendarPayload> {
    let calendar = payload
        .get("cals")
        .and_then(|cals| cals.get(&config.calendar_id))
        .ok_or_else(|| {
            ProviderError::invalid_response(format!("no calendar {} in payload", config.calendar_id))
                .with_provider(NAME)
        })?;
    CalendarPayload::deserialize(calendar).map_err(|e| {
        ProviderError::invalid_response(format!("unexpected calendar shape: {}", e)).with_provider(NAME)
    })
}

/// Regent Theatre provider.
pub struct RegentProvider {
    config: RegentConfig,
    http: HttpClient,
    cache: DailyCache,
    base: Url,
}

impl RegentProvider {
    /// Creates a new provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configured URLs do not parse.
    pub fn new(config: RegentConfig, http: HttpClient, cache: DailyCache) -> ProviderResult<Self> {
        parse_url(NAME, &config.ajax_url)?;
        let base = parse_url(NAME, &config.schedule_url)?;
        Ok(Self {
            config,
            http,
            cache,
            base,
        })
    }

    fn cache_key(year: i32, month: u32) -> CacheKey {
        CacheKey::new(NAME).with_qualifier(format!("month-{:04}-{:02}", year, month))
    }

    async fn download(&self, year: i32, month: u32) -> ProviderResult<Value> {
        let form = month_form(&self.config, year, month).ok_or_else(|| {
            ProviderError::internal(format!("no such month {:04}-{:02}", year, month))
        })?;
        let body = self.http.post_form_text(&self.config.ajax_url, &form).await?;
        let payload = serde_json::from_str(&body)?;
        calendar_payload(&payload, &self.config)?;
        Ok(payload)
    }

    async fn month(&self, year: i32, month: u32) -> ProviderResult<Vec<RawShowing>> {
        let payload = self
            .cache
            .get_or_compute(&Self::cache_key(year, month), || self.download(year, month))
            .await?;
        parse_month(&payload, &self.config)
    }
}

impl ShowingProvider for RegentProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Json
    }

    fn fetch_showings(&self, range: DateRange) -> BoxFuture<'_, ProviderResult<SourceResult>> {
        Box::pin(async move {
            let months = range.months();
            let mut raws = Vec::new();
            let mut last_error = None;
            let mut succeeded = 0usize;

            for &(year, month) in &months {
                match self.month(year, month).await {
                    Ok(month_raws) => {
                        succeeded += 1;
                        raws.extend(month_raws);
                    }
                    Err(e) => {
                        warn!(source = NAME, year, month, error = %e, "skipping month");
                        last_error = Some(e);
                    }
                }
            }

            if let (0, Some(e)) = (succeeded, last_error) {
                return Err(e.with_provider(NAME));
            }
            Ok(build_source_result(NAME, raws, &range, &self.base))
        })
    }

    fn invalidate_cache(&self, day: Option<NaiveDate>) -> ProviderResult<()> {
        invalidate_source(&self.cache, NAME, day)
    }
}
