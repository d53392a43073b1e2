//! Date ranges for showing queries.
//!
//! Listings are bucketed by the cinema's local calendar date, so every query
//! is expressed as an inclusive [`DateRange`] of [`NaiveDate`]s rather than a
//! window of instants.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a date range cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateRangeError {
    #[error("invalid date range: {from} is after {to}")]
    Reversed { from: NaiveDate, to: NaiveDate },

    #[error("invalid date range: {days} days from {start} runs past the last representable date")]
    OutOfBounds { start: NaiveDate, days: u32 },
}

/// An inclusive range of calendar days, `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    /// Creates a new range.
    ///
    /// # Errors
    ///
    /// Returns [`DateRangeError`] if `from` is after `to`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, DateRangeError> {
        if from > to {
            return Err(DateRangeError::Reversed { from, to });
        }
        Ok(Self { from, to })
    }

    /// A range covering exactly one day.
    pub fn single(day: NaiveDate) -> Self {
        Self { from: day, to: day }
    }

    /// A range of `days` days starting at `start`. Zero is treated as one.
    ///
    /// # Errors
    ///
    /// Returns [`DateRangeError::OutOfBounds`] if the last day is not a
    /// representable date.
    pub fn starting_at(start: NaiveDate, days: u32) -> Result<Self, DateRangeError> {
        let span = u64::from(days.max(1) - 1);
        let to = start
            .checked_add_days(Days::new(span))
            .ok_or(DateRangeError::OutOfBounds { start, days })?;
        Ok(Self { from: start, to })
    }

    /// The seven days `start..=start+6`, cut short at the last representable
    /// date.
    pub fn week_starting(start: NaiveDate) -> Self {
        let to = start.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX);
        Self { from: start, to }
    }

    /// First day of the range.
    pub fn from(&self) -> NaiveDate {
        self.from
    }

    /// Last day of the range.
    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// Returns true if `day` falls inside the range (bounds inclusive).
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }

    /// Number of days covered, counting both ends.
    pub fn len_days(&self) -> usize {
        (self.to - self.from).num_days() as usize + 1
    }

    /// Iterates over every day in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d <= to)
    }

    /// Distinct `(year, month)` pairs touched by the range, in order.
    pub fn months(&self) -> Vec<(i32, u32)> {
        let mut months: Vec<(i32, u32)> = Vec::new();
        for day in self.days() {
            let ym = (day.year(), day.month());
            if months.last() != Some(&ym) {
                months.push(ym);
            }
        }
        months
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}
