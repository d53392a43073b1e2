//! Showing types.
//!
//! This module provides the canonical listing records:
//! - [`Showing`]: one film playing at one cinema on one date
//! - [`SourceResult`]: one source's showings, bucketed by date

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::time::DateRange;

/// One film playing at one cinema on one date.
///
/// Showings are built once by a source adapter and never mutated afterwards,
/// so fields are exposed through accessors only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Showing {
    date: NaiveDate,
    title: String,
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    excerpt: Option<String>,
}

impl Showing {
    /// Creates a showing without an excerpt.
    pub fn new(date: NaiveDate, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            date,
            title: title.into(),
            url: url.into(),
            excerpt: None,
        }
    }

    /// Builder method to attach a synopsis.
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    /// The local calendar date the film plays on.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Display title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Purchase or info page.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Synopsis, for sources that publish one.
    pub fn excerpt(&self) -> Option<&str> {
        self.excerpt.as_deref()
    }

    /// Key used to order showings within a day: the title, case-folded.
    pub fn sort_key(&self) -> String {
        self.title.to_lowercase()
    }

    /// Returns true if the URL parses as an absolute URL.
    pub fn has_absolute_url(&self) -> bool {
        Url::parse(&self.url).is_ok()
    }
}

fn by_title(a: &Showing, b: &Showing) -> Ordering {
    a.sort_key().cmp(&b.sort_key())
}

/// One source's showings for a run, keyed by date.
///
/// Dates iterate in ascending order. Within a date, showings keep the order
/// they were pushed in until [`SourceResult::sort_by_title`] is applied. Empty
/// date buckets are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceResult {
    by_date: BTreeMap<NaiveDate, Vec<Showing>>,
}

impl SourceResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a showing to its date's bucket.
    pub fn push(&mut self, showing: Showing) {
        self.by_date.entry(showing.date).or_default().push(showing);
    }

    /// Showings for one date, if any.
    pub fn get(&self, date: NaiveDate) -> Option<&[Showing]> {
        self.by_date.get(&date).map(Vec::as_slice)
    }

    /// Dates that have at least one showing, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.by_date.keys().copied()
    }

    /// Iterates over `(date, showings)` pairs, ascending by date.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &[Showing])> {
        self.by_date.iter().map(|(d, s)| (*d, s.as_slice()))
    }

    /// Number of dates with showings.
    pub fn len_days(&self) -> usize {
        self.by_date.len()
    }

    /// Number of showings across all dates.
    pub fn total_showings(&self) -> usize {
        self.by_date.values().map(Vec::len).sum()
    }

    /// Returns true if there are no showings at all.
    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    /// Sorts each date's showings by case-insensitive title.
    ///
    /// The sort is stable, so equal titles keep their insertion order.
    pub fn sort_by_title(&mut self) {
        for showings in self.by_date.values_mut() {
            showings.sort_by(by_title);
        }
    }

    /// Drops every date outside `range`.
    pub fn restricted_to(mut self, range: &DateRange) -> Self {
        self.by_date.retain(|date, _| range.contains(*date));
        self
    }
}

impl FromIterator<Showing> for SourceResult {
    fn from_iter<I: IntoIterator<Item = Showing>>(iter: I) -> Self {
        let mut result = Self::new();
        result.extend(iter);
        result
    }
}

impl Extend<Showing> for SourceResult {
    fn extend<I: IntoIterator<Item = Showing>>(&mut self, iter: I) {
        for showing in iter {
            self.push(showing);
        }
    }
}

impl IntoIterator for SourceResult {
    type Item = Showing;
    type IntoIter = std::iter::Flatten<std::collections::btree_map::IntoValues<NaiveDate, Vec<Showing>>>;

    /// Yields showings date by date, each date in its stored order.
    fn into_iter(self) -> Self::IntoIter {
        self.by_date.into_values().flatten()
    }
}
