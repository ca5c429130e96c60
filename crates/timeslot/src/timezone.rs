//! Timezone helpers shared by the schedule, exception and resolver layers.
//!
//! Every aggregate stores an optional timezone and resolves it through one
//! `timezone()` accessor; the fallback is always UTC.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::dst::{localize, DstPolicy};
use crate::error::{Result, TimeslotError};

/// Parse an IANA timezone name (e.g., `"America/New_York"`).
///
/// # Errors
/// Returns [`TimeslotError::InvalidTimezone`] for empty or unknown names.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TimeslotError::InvalidTimezone("empty timezone name".to_string()));
    }
    trimmed
        .parse()
        .map_err(|_| TimeslotError::InvalidTimezone(format!("'{}'", trimmed)))
}

/// The calendar date of `instant` as seen in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Local midnight of the day containing `instant` in `tz`, as an instant.
pub fn start_of_day(instant: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    midnight(local_date(instant, tz), tz).unwrap_or(instant)
}

/// Local midnight of `date` in `tz`. Zones whose midnight falls in a DST gap
/// start the day at the first valid time after it.
pub fn midnight(date: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    localize(date, NaiveTime::MIN, tz, DstPolicy::ShiftForward)
}

/// Whether `a` and `b` fall on the same calendar date in `tz`.
pub fn same_day(a: DateTime<Utc>, b: DateTime<Utc>, tz: Tz) -> bool {
    local_date(a, tz) == local_date(b, tz)
}

pub fn clamp(t: DateTime<Utc>, min: DateTime<Utc>, max: DateTime<Utc>) -> DateTime<Utc> {
    t.max(min).min(max)
}

/// The current wall-clock time in `tz`.
pub fn now_in(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}
