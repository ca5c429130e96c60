//! Availability resolution: weekly schedule + exceptions + bookings.
//!
//! [`Availability`] is the single source of truth for one resource's free time.
//! [`Availability::slots`] walks the query window one local calendar day at a
//! time and layers, in order:
//!
//! 1. the day's base ranges: a modified override for the date if one exists,
//!    otherwise the weekly ranges for its weekday;
//! 2. minus every blocked range;
//! 3. plus every available-override range, clipped to the window;
//! 4. minus every booking.
//!
//! Bookings come last, so an available override never re-opens a booked window.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::collection::IntervalCollection;
use crate::error::Result;
use crate::exceptions::ExceptionSet;
use crate::interval::{Interval, Metadata};
use crate::schedule::{clip, project_ranges, TimeRange, WeeklySchedule};
use crate::timezone::{local_date, midnight};

/// Window around a point query; wide enough to cover any local day.
const LOOKUP_WINDOW_HOURS: i64 = 24;

/// A resource's schedule, exceptions and bookings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Availability {
    weekly: WeeklySchedule,
    exceptions: ExceptionSet,
    bookings: IntervalCollection,
    timezone: Option<Tz>,
}

impl Availability {
    /// An empty availability whose schedule is read in `tz`.
    pub fn new(tz: Tz) -> Self {
        Self {
            weekly: WeeklySchedule::new(tz),
            timezone: Some(tz),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_weekly_schedule(mut self, weekly: WeeklySchedule) -> Self {
        self.weekly = weekly;
        self
    }

    #[must_use]
    pub fn with_exceptions(mut self, exceptions: ExceptionSet) -> Self {
        self.exceptions = exceptions;
        self
    }

    /// Set the resolution timezone on both the aggregate and its schedule.
    #[must_use]
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.timezone = Some(tz);
        self.weekly = self.weekly.with_timezone(tz);
        self
    }

    #[must_use]
    pub fn add_blocked_dates(mut self, dates: impl IntoIterator<Item = DateTime<Tz>>) -> Self {
        self.exceptions = self.exceptions.add_blocked_dates(dates);
        self
    }

    #[must_use]
    pub fn add_blocked_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.exceptions = self.exceptions.add_blocked_range(start, end);
        self
    }

    #[must_use]
    pub fn add_available_override(
        mut self,
        date: DateTime<Tz>,
        ranges: impl IntoIterator<Item = TimeRange>,
    ) -> Self {
        self.exceptions = self.exceptions.add_available_override(date, ranges);
        self
    }

    #[must_use]
    pub fn add_booking(self, booking: Interval) -> Self {
        self.add_bookings([booking])
    }

    #[must_use]
    pub fn add_bookings(mut self, bookings: impl IntoIterator<Item = Interval>) -> Self {
        self.bookings = self.bookings.add(bookings);
        self
    }

    /// Free the window covered by `booking`.
    #[must_use]
    pub fn remove_booking(mut self, booking: &Interval) -> Self {
        self.bookings = self.bookings.remove([booking.clone()]);
        self
    }

    pub fn weekly(&self) -> &WeeklySchedule {
        &self.weekly
    }

    pub fn exceptions(&self) -> &ExceptionSet {
        &self.exceptions
    }

    pub fn bookings(&self) -> &IntervalCollection {
        &self.bookings
    }

    /// The aggregate's timezone, else the schedule's, else UTC.
    pub fn timezone(&self) -> Tz {
        self.timezone
            .or(self.weekly.timezone_tag())
            .unwrap_or(Tz::UTC)
    }

    /// Free time within `[from, to)`.
    pub fn slots(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> IntervalCollection {
        if to <= from {
            return IntervalCollection::empty();
        }
        let tz = self.timezone();
        let policy = self.weekly.dst_policy();

        let last = local_date(to, tz);
        let mut generated = Vec::new();
        for date in local_date(from, tz).iter_days().take_while(|date| *date <= last) {
            let Some(day_start) = midnight(date, tz) else {
                continue;
            };
            let ranges = match self.exceptions.modified_for_date(day_start.with_timezone(&tz)) {
                Some(ranges) => {
                    debug!(%date, "using modified override ranges");
                    ranges
                }
                None => self.weekly.ranges_on(date),
            };
            generated.extend(
                project_ranges(ranges, date, tz, policy)
                    .filter_map(|interval| clip(&interval, from, to)),
            );
        }
        let mut free = IntervalCollection::new(generated);

        let blocked = self
            .exceptions
            .blocked()
            .iter()
            .filter_map(|range| range.to_interval(tz));
        free = free.remove(blocked);

        let opened: Vec<Interval> = self
            .exceptions
            .available()
            .iter()
            .filter_map(|range| range.to_interval(tz))
            .filter_map(|interval| clip(&interval, from, to))
            .collect();
        if !opened.is_empty() {
            free = free.add(opened);
        }

        let free = free.subtract(&self.bookings);
        debug!(
            from = %from,
            to = %to,
            intervals = free.len(),
            "resolved availability"
        );
        free
    }

    /// Whether `instant` falls in free time.
    pub fn is_available(&self, instant: DateTime<Utc>) -> bool {
        let window = Duration::hours(LOOKUP_WINDOW_HOURS);
        self.slots(instant - window, instant + window)
            .overlaps(&self.instant_interval(instant))
    }

    /// Whether `instant` falls inside a booking.
    pub fn is_booked(&self, instant: DateTime<Utc>) -> bool {
        self.bookings.overlaps(&self.instant_interval(instant))
    }

    /// Consecutive windows of exactly `duration` inside each free interval of
    /// `[from, to)`. Partial remainders are dropped.
    pub fn find_available_slots(
        &self,
        duration: Duration,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Interval> {
        if duration <= Duration::zero() {
            return Vec::new();
        }
        self.slots(from, to)
            .iter()
            .flat_map(|free| free.split(duration))
            .filter(|candidate| candidate.duration() == duration)
            .collect()
    }

    /// # Errors
    /// Returns the first structural problem in the weekly schedule, then the
    /// exception set, then the bookings.
    pub fn validate(&self) -> Result<()> {
        self.weekly.validate()?;
        self.exceptions.validate()?;
        self.bookings.iter().try_for_each(Interval::validate)
    }

    fn instant_interval(&self, instant: DateTime<Utc>) -> Interval {
        Interval::from_parts(
            instant,
            instant + Duration::seconds(1),
            Some(self.timezone()),
            Metadata::new(),
        )
    }
}
