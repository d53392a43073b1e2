//! Raw showing records extracted from source payloads.
//!
//! A [`RawShowing`] is what an adapter pulls out of a JSON document or an HTML
//! page before any cleanup: titles may carry stray whitespace, links may be
//! relative or missing, and the same film may appear several times for one
//! day (one per screening). [`crate::normalize`] turns these into
//! [`kinocal_core::Showing`]s.

use chrono::NaiveDate;

/// One film-on-a-day as found upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawShowing {
    /// Source-specific stable identifier (slug, film id, href, ...).
    pub identity: String,
    /// Local calendar date of the screening.
    pub date: NaiveDate,
    /// Title exactly as published.
    pub title: String,
    /// Link as published; may be relative to the source's base URL.
    pub url: Option<String>,
    /// Synopsis, when the source publishes one.
    pub excerpt: Option<String>,
}

impl RawShowing {
    /// Creates a raw showing with no link and no excerpt.
    pub fn new(identity: impl Into<String>, date: NaiveDate, title: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            date,
            title: title.into(),
            url: None,
            excerpt: None,
        }
    }

    /// Builder method to set the link.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Builder method to set the synopsis. Blank synopses are ignored.
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        let excerpt = excerpt.into();
        if !excerpt.trim().is_empty() {
            self.excerpt = Some(excerpt);
        }
        self
    }

    /// Builder method to set the synopsis from an optional value.
    pub fn with_excerpt_opt(self, excerpt: Option<impl Into<String>>) -> Self {
        match excerpt {
            Some(excerpt) => self.with_excerpt(excerpt),
            None => self,
        }
    }

    /// The `(date, identity)` pair used to collapse repeat screenings.
    pub fn dedup_key(&self) -> (NaiveDate, &str) {
        (self.date, self.identity.as_str())
    }
}
