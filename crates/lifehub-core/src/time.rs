//! Time windows for calendar queries.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Default reach of calendar imports on either side of "now".
    pub const DEFAULT_IMPORT_DAYS: i64 = 30;

    /// Creates a new time window. The bounds are swapped if reversed.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Creates a window of `days` on both sides of `now`.
    pub fn around(now: DateTime<Utc>, days: i64) -> Self {
        let reach = Duration::days(days.abs());
        Self::new(now - reach, now + reach)
    }

    /// The default calendar import window: thirty days back and forward.
    pub fn import_default(now: DateTime<Utc>) -> Self {
        Self::around(now, Self::DEFAULT_IMPORT_DAYS)
    }

    /// Returns true if `dt` falls within the window.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        dt >= self.start && dt < self.end
    }

    /// Returns true if the whole day `date` overlaps the window.
    pub fn overlaps_date(&self, date: NaiveDate) -> bool {
        let Some(day_start) = date.and_hms_opt(0, 0, 0).map(|d| d.and_utc()) else {
            return false;
        };
        day_start < self.end && day_start + Duration::days(1) > self.start
    }

    /// Returns the window length.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}
