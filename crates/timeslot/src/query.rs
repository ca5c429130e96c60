//! Slot search criteria: duration, window, constraints and preferences.
//!
//! Constraints are boolean filters over candidate intervals; preferences score
//! candidates so [`optimize_slots`] can order them. Both are open traits, so
//! callers can plug in their own rules next to the built-in ones.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use chrono_tz::Tz;

use crate::dst::DstPolicy;
use crate::error::{Result, TimeslotError};
use crate::interval::Interval;
use crate::schedule::TimeOfDay;

/// Window used by [`QueryBuilder::build`] when only a start is known.
const DEFAULT_SEARCH_DAYS: i64 = 7;

/// A boolean filter on candidate slots.
pub trait Constraint: Send + Sync + fmt::Debug {
    fn is_satisfied(&self, slot: &Interval) -> bool;
    fn name(&self) -> &str;
}

/// A scoring rule on candidate slots. Higher scores sort first.
pub trait Preference: Send + Sync + fmt::Debug {
    fn score(&self, slot: &Interval) -> i64;
    fn name(&self) -> &str;
}

/// Search criteria for bookable slots.
#[derive(Debug, Clone)]
pub struct Query {
    pub duration: Duration,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub constraints: Vec<Arc<dyn Constraint>>,
    pub preferences: Vec<Arc<dyn Preference>>,
    /// Maximum number of results; `0` means unlimited.
    pub limit: usize,
    /// Wall-clock zone the search is phrased in. When set, candidates are
    /// retagged with it before constraints and preferences see them.
    pub timezone: Option<Tz>,
}

impl Query {
    /// A query with no constraints or preferences.
    pub fn new(duration: Duration, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            duration,
            from,
            to,
            constraints: Vec::new(),
            preferences: Vec::new(),
            limit: 0,
            timezone: None,
        }
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// # Errors
    /// Returns [`TimeslotError::InvalidDuration`] for a non-positive duration
    /// and [`TimeslotError::InvalidRange`] when `to` is not after `from`.
    pub fn validate(&self) -> Result<()> {
        if self.duration <= Duration::zero() {
            return Err(TimeslotError::InvalidDuration(
                "query duration must be positive".to_string(),
            ));
        }
        if self.to <= self.from {
            return Err(TimeslotError::InvalidRange(
                "query end must be after its start".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `slot` passes every constraint.
    pub fn accepts(&self, slot: &Interval) -> bool {
        self.constraints.iter().all(|c| c.is_satisfied(slot))
    }

    /// `slot` as seen by this query: retagged with the query timezone if set.
    pub fn localize(&self, slot: Interval) -> Interval {
        match self.timezone {
            Some(tz) => slot.in_timezone(tz),
            None => slot,
        }
    }

    /// Sum of all preference scores for `slot`.
    pub fn score(&self, slot: &Interval) -> i64 {
        self.preferences
            .iter()
            .fold(0i64, |acc, p| acc.saturating_add(p.score(slot)))
    }
}

/// Fluent construction of a [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    duration: Option<Duration>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    constraints: Vec<Arc<dyn Constraint>>,
    preferences: Vec<Arc<dyn Preference>>,
    limit: usize,
    timezone: Option<Tz>,
}

impl QueryBuilder {
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    #[must_use]
    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    #[must_use]
    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    /// Search from now until now plus `window`.
    #[must_use]
    pub fn in_next(self, window: Duration) -> Self {
        let now = Utc::now();
        self.between(now, now + window)
    }

    #[must_use]
    pub fn on_weekdays(self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.with_constraint(WeekdayConstraint::new(days))
    }

    /// Starts between 00:00:00 and 11:59:59.
    #[must_use]
    pub fn only_mornings(self) -> Self {
        self.with_constraint(TimeOfDayConstraint::between(
            TimeOfDay::new(0, 0, 0),
            TimeOfDay::new(11, 59, 59),
        ))
    }

    /// Starts between 12:00 and 17:00.
    #[must_use]
    pub fn only_afternoons(self) -> Self {
        self.with_constraint(TimeOfDayConstraint::between(
            TimeOfDay::hm(12, 0),
            TimeOfDay::hm(17, 0),
        ))
    }

    /// Starts between 17:00 and 23:59:59.
    #[must_use]
    pub fn only_evenings(self) -> Self {
        self.with_constraint(TimeOfDayConstraint::between(
            TimeOfDay::hm(17, 0),
            TimeOfDay::new(23, 59, 59),
        ))
    }

    #[must_use]
    pub fn not_before(self, time: TimeOfDay) -> Self {
        self.with_constraint(NotBeforeConstraint { time })
    }

    #[must_use]
    pub fn not_after(self, time: TimeOfDay) -> Self {
        self.with_constraint(NotAfterConstraint { time })
    }

    /// Keep candidates at least `gap` away from each of `bookings`.
    #[must_use]
    pub fn min_gap(self, gap: Duration, bookings: impl IntoIterator<Item = Interval>) -> Self {
        self.with_constraint(MinGapConstraint {
            gap,
            bookings: bookings.into_iter().collect(),
        })
    }

    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Constraint + 'static) -> Self {
        self.constraints.push(Arc::new(constraint));
        self
    }

    #[must_use]
    pub fn with_preference(mut self, preference: impl Preference + 'static) -> Self {
        self.preferences.push(Arc::new(preference));
        self
    }

    #[must_use]
    pub fn prefer_earlier(self) -> Self {
        self.with_preference(PreferEarlier)
    }

    #[must_use]
    pub fn prefer_later(self) -> Self {
        self.with_preference(PreferLater)
    }

    #[must_use]
    pub fn prefer_time(self, target: TimeOfDay) -> Self {
        self.with_preference(PreferTime { target })
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn in_timezone(mut self, tz: Tz) -> Self {
        self.timezone = Some(tz);
        self
    }

    /// Finish the query. A missing start defaults to now; a missing end
    /// defaults to a week after the start when a positive duration is set.
    pub fn build(self) -> Query {
        let duration = self.duration.unwrap_or_else(Duration::zero);
        let from = self.from.unwrap_or_else(Utc::now);
        let to = match self.to {
            Some(to) => to,
            None if duration > Duration::zero() => from + Duration::days(DEFAULT_SEARCH_DAYS),
            None => from,
        };
        Query {
            duration,
            from,
            to,
            constraints: self.constraints,
            preferences: self.preferences,
            limit: self.limit,
            timezone: self.timezone,
        }
    }

    /// # Errors
    /// As [`Query::validate`] on the built query.
    pub fn validate(&self) -> Result<()> {
        self.clone().build().validate()
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Start time of `slot` as wall-clock time in its own timezone.
fn local_time_of_day(slot: &Interval) -> TimeOfDay {
    TimeOfDay::from(slot.local_start().time())
}

/// Accepts slots starting on one of the given local weekdays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekdayConstraint {
    pub days: Vec<Weekday>,
}

impl WeekdayConstraint {
    pub fn new(days: impl IntoIterator<Item = Weekday>) -> Self {
        let mut days: Vec<Weekday> = days.into_iter().collect();
        days.sort_by_key(Weekday::num_days_from_monday);
        days.dedup();
        Self { days }
    }
}

impl Constraint for WeekdayConstraint {
    fn is_satisfied(&self, slot: &Interval) -> bool {
        self.days.contains(&slot.local_start().weekday())
    }

    fn name(&self) -> &str {
        "weekday"
    }
}

/// Accepts slots whose local start lies in `[start, end]`. Either bound may
/// be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeOfDayConstraint {
    pub start: Option<TimeOfDay>,
    pub end: Option<TimeOfDay>,
}

impl TimeOfDayConstraint {
    pub fn between(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }
}

impl Constraint for TimeOfDayConstraint {
    fn is_satisfied(&self, slot: &Interval) -> bool {
        let t = local_time_of_day(slot);
        self.start.map_or(true, |start| t >= start) && self.end.map_or(true, |end| t <= end)
    }

    fn name(&self) -> &str {
        "time-of-day"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotBeforeConstraint {
    pub time: TimeOfDay,
}

impl Constraint for NotBeforeConstraint {
    fn is_satisfied(&self, slot: &Interval) -> bool {
        local_time_of_day(slot) >= self.time
    }

    fn name(&self) -> &str {
        "not-before"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotAfterConstraint {
    pub time: TimeOfDay,
}

impl Constraint for NotAfterConstraint {
    fn is_satisfied(&self, slot: &Interval) -> bool {
        local_time_of_day(slot) <= self.time
    }

    fn name(&self) -> &str {
        "not-after"
    }
}

/// Rejects slots closer than `gap` to any of `bookings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinGapConstraint {
    pub gap: Duration,
    pub bookings: Vec<Interval>,
}

impl Constraint for MinGapConstraint {
    fn is_satisfied(&self, slot: &Interval) -> bool {
        !self.bookings.iter().any(|booking| {
            booking.start() - self.gap < slot.end() && slot.start() < booking.end() + self.gap
        })
    }

    fn name(&self) -> &str {
        "min-gap"
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreferEarlier;

impl Preference for PreferEarlier {
    fn score(&self, slot: &Interval) -> i64 {
        -slot.start().timestamp()
    }

    fn name(&self) -> &str {
        "prefer-earlier"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreferLater;

impl Preference for PreferLater {
    fn score(&self, slot: &Interval) -> i64 {
        slot.start().timestamp()
    }

    fn name(&self) -> &str {
        "prefer-later"
    }
}

/// Scores slots by how close their start is to `target` on the same local
/// day, in negated seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreferTime {
    pub target: TimeOfDay,
}

impl Preference for PreferTime {
    fn score(&self, slot: &Interval) -> i64 {
        let local = slot.local_start();
        match self
            .target
            .on(local.date_naive(), slot.timezone(), DstPolicy::ShiftForward)
        {
            Some(target) => -(slot.start() - target).num_seconds().abs(),
            None => i64::MIN,
        }
    }

    fn name(&self) -> &str {
        "prefer-time"
    }
}

/// Order `slots` by descending total score, breaking ties by earlier start,
/// then keep at most `query.limit` of them.
pub fn optimize_slots(slots: Vec<Interval>, query: &Query) -> Vec<Interval> {
    let mut scored: Vec<(i64, Interval)> = slots
        .into_iter()
        .map(|slot| (query.score(&slot), slot))
        .collect();
    scored.sort_by(|(score_a, a), (score_b, b)| {
        score_b.cmp(score_a).then_with(|| a.start().cmp(&b.start()))
    });
    let mut out: Vec<Interval> = scored.into_iter().map(|(_, slot)| slot).collect();
    if query.limit > 0 {
        out.truncate(query.limit);
    }
    out
}
