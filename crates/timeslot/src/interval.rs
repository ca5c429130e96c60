//! Half-open time intervals `[start, end)` with a timezone tag and metadata.
//!
//! An [`Interval`] is an immutable value: every operation that derives a new
//! window (shift, intersection, union, split, retime) returns a fresh value and
//! re-establishes the `end > start` invariant. Instants are stored in UTC; the
//! timezone only affects how the interval is rendered and how wall-clock
//! questions (weekday, time of day) are answered about it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TimeslotError};
use crate::timezone::parse_timezone;

/// Opaque key-value payload carried by an interval. Key order is irrelevant.
pub type Metadata = BTreeMap<String, Value>;

/// A half-open time window `[start, end)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "IntervalRepr", into = "IntervalRepr")]
pub struct Interval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timezone: Option<Tz>,
    metadata: Metadata,
}

impl Interval {
    /// Create an interval with no timezone tag (treated as UTC).
    ///
    /// # Errors
    /// Returns [`TimeslotError::InvalidRange`] when `end <= start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let interval = Self::from_parts(start, end, None, Metadata::new());
        interval.validate()?;
        Ok(interval)
    }

    /// Create an interval tagged with `tz`.
    ///
    /// # Errors
    /// Returns [`TimeslotError::InvalidRange`] when `end <= start`.
    pub fn new_in(start: DateTime<Utc>, end: DateTime<Utc>, tz: Tz) -> Result<Self> {
        let interval = Self::from_parts(start, end, Some(tz), Metadata::new());
        interval.validate()?;
        Ok(interval)
    }

    /// Build an interval without validation. Callers either validate right
    /// after or derive the bounds from already-valid intervals.
    pub(crate) fn from_parts(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timezone: Option<Tz>,
        metadata: Metadata,
    ) -> Self {
        Self {
            start,
            end,
            timezone,
            metadata,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// The effective timezone: the tagged one, or UTC when untagged.
    pub fn timezone(&self) -> Tz {
        self.timezone.unwrap_or(Tz::UTC)
    }

    /// The raw timezone tag, `None` when the interval was created untagged.
    pub fn timezone_tag(&self) -> Option<Tz> {
        self.timezone
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Attach a metadata entry, replacing any previous value under `key`.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Start as wall-clock time in the interval's timezone.
    pub fn local_start(&self) -> DateTime<Tz> {
        self.start.with_timezone(&self.timezone())
    }

    /// End as wall-clock time in the interval's timezone.
    pub fn local_end(&self) -> DateTime<Tz> {
        self.end.with_timezone(&self.timezone())
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Start-inclusive, end-exclusive containment.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Whether `other` lies entirely within this interval.
    pub fn encloses(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Two intervals overlap iff `a.start < b.end && b.start < a.end`.
    /// Touching intervals (one ends exactly when the other starts) do not.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether one interval ends exactly where the other starts.
    pub fn is_adjacent(&self, other: &Interval) -> bool {
        self.end == other.start || other.end == self.start
    }

    /// The overlapping portion, tagged with `other`'s timezone if it has one.
    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self::from_parts(
            self.start.max(other.start),
            self.end.min(other.end),
            other.timezone.or(self.timezone),
            Metadata::new(),
        ))
    }

    /// The smallest interval covering both, for overlapping or adjacent inputs.
    ///
    /// # Errors
    /// Returns [`TimeslotError::DisjointUnion`] when there is a gap between them.
    pub fn union(&self, other: &Interval) -> Result<Interval> {
        if !self.overlaps(other) && !self.is_adjacent(other) {
            return Err(TimeslotError::DisjointUnion);
        }
        Ok(Self::from_parts(
            self.start.min(other.start),
            self.end.max(other.end),
            self.timezone,
            Metadata::new(),
        ))
    }

    /// Consecutive sub-intervals of `step`; the last one is clipped to `end`.
    ///
    /// A non-positive step yields nothing. The iterator is lazy and can be
    /// restarted by cloning it before consumption.
    pub fn split(&self, step: Duration) -> Split<'_> {
        Split {
            interval: self,
            step,
            cursor: self.start,
        }
    }

    /// The same window moved by `delta`.
    #[must_use]
    pub fn shift(&self, delta: Duration) -> Interval {
        Self::from_parts(
            self.start + delta,
            self.end + delta,
            self.timezone,
            self.metadata.clone(),
        )
    }

    /// The same instants, tagged with `tz`.
    #[must_use]
    pub fn in_timezone(&self, tz: Tz) -> Interval {
        Self::from_parts(self.start, self.end, Some(tz), self.metadata.clone())
    }

    /// # Errors
    /// Returns [`TimeslotError::InvalidRange`] when `end <= start`.
    pub fn validate(&self) -> Result<()> {
        if self.end <= self.start {
            return Err(TimeslotError::InvalidRange(format!(
                "end {} is not after start {}",
                self.end.to_rfc3339(),
                self.start.to_rfc3339()
            )));
        }
        Ok(())
    }
}

impl PartialEq for Interval {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start
            && self.end == other.end
            && self.timezone().name() == other.timezone().name()
            && self.metadata == other.metadata
    }
}

impl Eq for Interval {}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.local_start().to_rfc3339(),
            self.local_end().to_rfc3339()
        )
    }
}

/// Iterator returned by [`Interval::split`].
#[derive(Debug, Clone)]
pub struct Split<'a> {
    interval: &'a Interval,
    step: Duration,
    cursor: DateTime<Utc>,
}

impl Iterator for Split<'_> {
    type Item = Interval;

    fn next(&mut self) -> Option<Interval> {
        if self.step <= Duration::zero() || self.cursor >= self.interval.end {
            return None;
        }
        let next = (self.cursor + self.step).min(self.interval.end);
        let piece = Interval::from_parts(
            self.cursor,
            next,
            self.interval.timezone,
            self.interval.metadata.clone(),
        );
        self.cursor = next;
        Some(piece)
    }
}

// ---------------------------------------------------------------------------
// Serde representation
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct IntervalRepr {
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timezone: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: Metadata,
}

impl From<Interval> for IntervalRepr {
    fn from(interval: Interval) -> Self {
        Self {
            start: interval.local_start().fixed_offset(),
            end: interval.local_end().fixed_offset(),
            timezone: Some(interval.timezone().name().to_string()),
            metadata: interval.metadata,
        }
    }
}

impl TryFrom<IntervalRepr> for Interval {
    type Error = TimeslotError;

    fn try_from(repr: IntervalRepr) -> Result<Self> {
        let timezone = repr.timezone.as_deref().map(parse_timezone).transpose()?;
        let interval = Self::from_parts(
            repr.start.with_timezone(&Utc),
            repr.end.with_timezone(&Utc),
            timezone,
            repr.metadata,
        );
        interval.validate()?;
        Ok(interval)
    }
}
