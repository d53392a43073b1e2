//! Core types: showings, per-source results, calendar, date ranges

pub mod calendar;
pub mod showing;
pub mod time;
pub mod tracing;

pub use calendar::Calendar;
pub use showing::{Showing, SourceResult};
pub use time::{DateRange, DateRangeError};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
