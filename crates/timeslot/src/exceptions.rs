//! Date-specific overrides layered on top of a weekly schedule.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::{Result, TimeslotError};
use crate::interval::{Interval, Metadata};
use crate::schedule::{normalize_ranges, one_day, TimeRange};
use crate::timezone::start_of_day;

/// An absolute `[start, end)` range. Not validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The full local day containing `date`: midnight plus 24 hours.
    pub fn full_day(date: DateTime<Tz>) -> Self {
        let start = start_of_day(date.with_timezone(&Utc), date.timezone());
        Self::new(start, start + one_day())
    }

    /// # Errors
    /// Returns [`TimeslotError::InvalidRange`] when `end <= start`.
    pub fn validate(&self) -> Result<()> {
        if self.end <= self.start {
            return Err(TimeslotError::InvalidRange(format!(
                "date range {} .. {} is empty",
                self.start.to_rfc3339(),
                self.end.to_rfc3339()
            )));
        }
        Ok(())
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// The range as an interval tagged with `tz`, if it is non-empty.
    pub fn to_interval(&self, tz: Tz) -> Option<Interval> {
        (self.end > self.start)
            .then(|| Interval::from_parts(self.start, self.end, Some(tz), Metadata::new()))
    }
}

/// Replacement ranges for a single calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct DateOverride {
    pub date: DateTime<Tz>,
    pub ranges: Vec<TimeRange>,
}

/// Blocked, available and per-date modified entries.
///
/// Entries are append-only: nothing is coalesced or removed, so overlapping
/// blocked ranges are kept as given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceptionSet {
    blocked: Vec<DateRange>,
    available: Vec<DateRange>,
    modified: Vec<DateOverride>,
}

impl ExceptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block each date in full, from local midnight for 24 hours in the
    /// date's own timezone.
    #[must_use]
    pub fn add_blocked_dates(mut self, dates: impl IntoIterator<Item = DateTime<Tz>>) -> Self {
        self.blocked.extend(dates.into_iter().map(DateRange::full_day));
        self
    }

    #[must_use]
    pub fn add_blocked_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.blocked.push(DateRange::new(start, end));
        self
    }

    /// With no ranges, mark the whole date available. With ranges, replace the
    /// weekly ranges for that date.
    #[must_use]
    pub fn add_available_override(
        mut self,
        date: DateTime<Tz>,
        ranges: impl IntoIterator<Item = TimeRange>,
    ) -> Self {
        let ranges: Vec<TimeRange> = ranges.into_iter().collect();
        if ranges.is_empty() {
            self.available.push(DateRange::full_day(date));
        } else {
            self.modified.push(DateOverride {
                date,
                ranges: normalize_ranges(ranges),
            });
        }
        self
    }

    pub fn blocked(&self) -> &[DateRange] {
        &self.blocked
    }

    pub fn available(&self) -> &[DateRange] {
        &self.available
    }

    pub fn modified(&self) -> &[DateOverride] {
        &self.modified
    }

    pub fn is_blocked(&self, instant: DateTime<Utc>) -> bool {
        self.blocked.iter().any(|range| range.contains(instant))
    }

    pub fn has_available_override(&self, instant: DateTime<Utc>) -> bool {
        self.available.iter().any(|range| range.contains(instant))
    }

    /// Ranges of the first modified entry on the same calendar date as `day`,
    /// compared in `day`'s timezone.
    pub fn modified_for_date(&self, day: DateTime<Tz>) -> Option<&[TimeRange]> {
        let tz = day.timezone();
        self.modified
            .iter()
            .find(|entry| entry.date.with_timezone(&tz).date_naive() == day.date_naive())
            .map(|entry| entry.ranges.as_slice())
    }

    /// # Errors
    /// Returns the first invalid blocked, available or modified range.
    pub fn validate(&self) -> Result<()> {
        self.blocked
            .iter()
            .chain(&self.available)
            .try_for_each(DateRange::validate)?;
        self.modified
            .iter()
            .flat_map(|entry| &entry.ranges)
            .try_for_each(TimeRange::validate)
    }
}
