//! Recurring weekly availability templates.
//!
//! A [`WeeklySchedule`] holds, for each weekday, a sorted and coalesced list of
//! wall-clock [`TimeRange`]s. Projecting the template onto calendar dates in the
//! schedule's timezone produces concrete [`Interval`]s.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::collection::IntervalCollection;
use crate::dst::{localize, DstPolicy};
use crate::error::{Result, TimeslotError};
use crate::interval::{Interval, Metadata};
use crate::timezone::local_date;

/// How far ahead [`WeeklySchedule::next_available`] looks, in days.
const NEXT_AVAILABLE_HORIZON_DAYS: u64 = 14;

/// Weekdays in validation order.
pub(crate) const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// A wall-clock time without a date.
///
/// Fields are public so out-of-range values can be represented and later
/// rejected by [`TimeOfDay::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl TimeOfDay {
    pub const fn new(hour: u32, minute: u32, second: u32) -> Self {
        Self {
            hour,
            minute,
            second,
        }
    }

    /// Shorthand for `HH:MM:00`.
    pub const fn hm(hour: u32, minute: u32) -> Self {
        Self::new(hour, minute, 0)
    }

    /// # Errors
    /// Returns [`TimeslotError::InvalidRange`] when a component is out of bounds.
    pub fn validate(&self) -> Result<()> {
        if self.hour > 23 {
            return Err(TimeslotError::InvalidRange(format!("invalid hour {}", self.hour)));
        }
        if self.minute > 59 {
            return Err(TimeslotError::InvalidRange(format!(
                "invalid minute {}",
                self.minute
            )));
        }
        if self.second > 59 {
            return Err(TimeslotError::InvalidRange(format!(
                "invalid second {}",
                self.second
            )));
        }
        Ok(())
    }

    pub fn to_naive_time(self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, self.second)
    }

    /// This wall-clock time on `date` in `tz`.
    pub fn on(self, date: NaiveDate, tz: Tz, policy: DstPolicy) -> Option<DateTime<Utc>> {
        localize(date, self.to_naive_time()?, tz, policy)
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(time: NaiveTime) -> Self {
        use chrono::Timelike;
        Self::new(time.hour(), time.minute(), time.second())
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeslotError;

    /// Parses `HH:MM` or `HH:MM:SS`.
    fn from_str(input: &str) -> Result<Self> {
        let parts: Vec<&str> = input.trim().split(':').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(TimeslotError::InvalidRange(format!(
                "invalid time of day '{}'",
                input
            )));
        }
        let mut values = [0u32; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| {
                TimeslotError::InvalidRange(format!("invalid time component '{}'", part))
            })?;
        }
        let tod = Self::new(values[0], values[1], values[2]);
        tod.validate()?;
        Ok(tod)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeslotError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.second == 0 {
            write!(f, "{:02}:{:02}", self.hour, self.minute)
        } else {
            write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
        }
    }
}

/// A same-day wall-clock window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeRange {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeRange {
    pub const fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    /// # Errors
    /// Returns [`TimeslotError::InvalidRange`] for out-of-bounds components or
    /// when `end` is not strictly after `start`.
    pub fn validate(&self) -> Result<()> {
        self.start.validate()?;
        self.end.validate()?;
        if self.end <= self.start {
            return Err(TimeslotError::InvalidRange(format!(
                "time range {} does not end after it starts",
                self
            )));
        }
        Ok(())
    }

    /// Project onto `date` in `tz`.
    ///
    /// Under [`DstPolicy::Skip`] a range whose start falls in a DST gap is
    /// dropped for that date. End boundaries inside a gap always move forward.
    pub fn on(&self, date: NaiveDate, tz: Tz, policy: DstPolicy) -> Option<Interval> {
        let start = self.start.on(date, tz, policy)?;
        let end = self.end.on(date, tz, DstPolicy::ShiftForward)?;
        (end > start).then(|| Interval::from_parts(start, end, Some(tz), Metadata::new()))
    }
}

impl FromStr for TimeRange {
    type Err = TimeslotError;

    /// Parses `HH:MM-HH:MM` or `HH:MM:SS-HH:MM:SS`.
    fn from_str(input: &str) -> Result<Self> {
        let (start, end) = input
            .trim()
            .split_once('-')
            .ok_or_else(|| TimeslotError::InvalidRange(format!("invalid range '{}'", input)))?;
        let range = Self::new(start.parse()?, end.parse()?);
        range.validate()?;
        Ok(range)
    }
}

impl TryFrom<String> for TimeRange {
    type Error = TimeslotError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeRange> for String {
    fn from(value: TimeRange) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Seven per-weekday range lists plus the timezone they are read in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeeklySchedule {
    /// Indexed by `Weekday::num_days_from_sunday`.
    days: [Vec<TimeRange>; 7],
    timezone: Option<Tz>,
    dst_policy: DstPolicy,
}

impl WeeklySchedule {
    /// An empty schedule read in `tz`.
    pub fn new(tz: Tz) -> Self {
        Self {
            timezone: Some(tz),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.timezone = Some(tz);
        self
    }

    #[must_use]
    pub fn with_dst_policy(mut self, policy: DstPolicy) -> Self {
        self.dst_policy = policy;
        self
    }

    /// Replace the ranges for `day`.
    ///
    /// Invalid ranges are dropped with a warning; the rest are sorted and
    /// coalesced (touching ranges merge).
    #[must_use]
    pub fn set_day(mut self, day: Weekday, ranges: impl IntoIterator<Item = TimeRange>) -> Self {
        self.days[day.num_days_from_sunday() as usize] = normalize_ranges(ranges);
        self
    }

    /// The ranges configured for `day`.
    pub fn get_day(&self, day: Weekday) -> &[TimeRange] {
        &self.days[day.num_days_from_sunday() as usize]
    }

    /// The ranges for the weekday of `date`.
    pub fn ranges_on(&self, date: NaiveDate) -> &[TimeRange] {
        self.get_day(date.weekday())
    }

    /// The effective timezone, UTC when unset.
    pub fn timezone(&self) -> Tz {
        self.timezone.unwrap_or(Tz::UTC)
    }

    pub fn timezone_tag(&self) -> Option<Tz> {
        self.timezone
    }

    pub fn dst_policy(&self) -> DstPolicy {
        self.dst_policy
    }

    pub fn is_empty(&self) -> bool {
        self.days.iter().all(Vec::is_empty)
    }

    /// Project the template onto every date touching `[from, to)`, clipped
    /// to the window.
    pub fn generate_slots(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> IntervalCollection {
        if to <= from {
            return IntervalCollection::empty();
        }
        let tz = self.timezone();
        let last = local_date(to, tz);
        let intervals = local_date(from, tz)
            .iter_days()
            .take_while(|date| *date <= last)
            .flat_map(|date| project_ranges(self.ranges_on(date), date, tz, self.dst_policy))
            .filter_map(|interval| clip(&interval, from, to));
        IntervalCollection::new(intervals)
    }

    /// Whether `instant` falls inside a range of its local weekday.
    pub fn is_available(&self, instant: DateTime<Utc>) -> bool {
        let tz = self.timezone();
        let date = local_date(instant, tz);
        project_ranges(self.ranges_on(date), date, tz, self.dst_policy)
            .any(|interval| interval.contains(instant))
    }

    /// The earliest instant at or after `after` that lies inside a range.
    ///
    /// Returns `after` itself when it is already inside a range, otherwise the
    /// next range start. Looks at most two weeks ahead.
    pub fn next_available(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let tz = self.timezone();
        local_date(after, tz)
            .iter_days()
            .take(NEXT_AVAILABLE_HORIZON_DAYS as usize)
            .flat_map(|date| project_ranges(self.ranges_on(date), date, tz, self.dst_policy))
            .find_map(|interval| {
                if interval.start() > after {
                    Some(interval.start())
                } else if interval.contains(after) {
                    Some(after)
                } else {
                    None
                }
            })
    }

    /// Per-weekday union of both schedules. The timezone falls back to
    /// `other`'s when this schedule has none.
    #[must_use]
    pub fn merge_with(&self, other: &WeeklySchedule) -> Self {
        let mut merged = self.clone();
        for day in WEEKDAYS {
            let combined: Vec<TimeRange> = self
                .get_day(day)
                .iter()
                .chain(other.get_day(day))
                .copied()
                .collect();
            merged = merged.set_day(day, combined);
        }
        if merged.timezone.is_none() {
            merged.timezone = other.timezone;
        }
        merged
    }

    /// # Errors
    /// Returns the first invalid range, scanning Monday through Sunday.
    pub fn validate(&self) -> Result<()> {
        WEEKDAYS
            .iter()
            .flat_map(|day| self.get_day(*day))
            .try_for_each(TimeRange::validate)
    }
}

/// Project `ranges` onto `date`, dropping any that collapse.
pub(crate) fn project_ranges(
    ranges: &[TimeRange],
    date: NaiveDate,
    tz: Tz,
    policy: DstPolicy,
) -> impl Iterator<Item = Interval> + '_ {
    ranges
        .iter()
        .filter_map(move |range| range.on(date, tz, policy))
}

/// `interval` restricted to `[from, to)`, or `None` if nothing remains.
pub(crate) fn clip(interval: &Interval, from: DateTime<Utc>, to: DateTime<Utc>) -> Option<Interval> {
    let start = interval.start().max(from);
    let end = interval.end().min(to);
    (end > start).then(|| {
        Interval::from_parts(
            start,
            end,
            interval.timezone_tag(),
            interval.metadata().clone(),
        )
    })
}

/// Drop invalid ranges, sort by start, and coalesce overlapping or touching ones.
pub(crate) fn normalize_ranges(ranges: impl IntoIterator<Item = TimeRange>) -> Vec<TimeRange> {
    let mut valid: Vec<TimeRange> = ranges
        .into_iter()
        .filter(|range| match range.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(range = %range, error = %e, "dropping invalid time range");
                false
            }
        })
        .collect();
    valid.sort_by_key(|range| range.start);

    let mut out: Vec<TimeRange> = Vec::with_capacity(valid.len());
    for next in valid {
        match out.last_mut() {
            Some(current) if next.start <= current.end => {
                current.end = current.end.max(next.end);
            }
            _ => out.push(next),
        }
    }
    out
}

/// One calendar day, in hours, for full-day exception entries.
pub(crate) fn one_day() -> Duration {
    Duration::hours(24)
}
