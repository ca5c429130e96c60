//! DST transition policies for projecting wall-clock times onto dates.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz};

/// Longest offset transition we are prepared to step across, in minutes.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Policy for wall-clock times that do not exist in a timezone (spring-forward gaps).
///
/// Ambiguous times (fall-back overlaps) always resolve to the earlier instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DstPolicy {
    /// Drop times that fall in the DST gap (e.g., 2:30 AM during spring forward).
    Skip,
    /// Move to the first valid wall-clock time after the gap.
    #[default]
    ShiftForward,
}

/// Resolve `time` on `date` in `tz` to an instant, applying `policy` to gaps.
///
/// Returns `None` only when the policy is [`DstPolicy::Skip`] and the local
/// time does not exist.
pub fn localize(date: NaiveDate, time: NaiveTime, tz: Tz, policy: DstPolicy) -> Option<DateTime<Utc>> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => match policy {
            DstPolicy::Skip => None,
            DstPolicy::ShiftForward => (1..=MAX_GAP_MINUTES).find_map(|minutes| {
                tz.from_local_datetime(&(naive + Duration::minutes(minutes)))
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
            }),
        },
    }
}

/// Whether daylight saving time is in effect at `instant` in `tz`.
pub fn is_dst(instant: DateTime<Utc>, tz: Tz) -> bool {
    !instant.with_timezone(&tz).offset().dst_offset().is_zero()
}

/// Whether the UTC offset of `tz` changes during the local day `date`.
///
/// A day whose midnight does not exist counts as a transition day.
pub fn is_dst_transition_day(date: NaiveDate, tz: Tz) -> bool {
    let Some(start) = tz.from_local_datetime(&date.and_time(NaiveTime::MIN)).earliest() else {
        return true;
    };
    let end = start.with_timezone(&Utc) + Duration::hours(24);
    start.offset().fix() != tz.offset_from_utc_datetime(&end.naive_utc()).fix()
}
