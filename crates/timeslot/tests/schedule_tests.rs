//! Tests for weekly schedules, time-of-day parsing and DST projection.

use chrono::{DateTime, TimeZone, Utc, Weekday};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use timeslot::{DstPolicy, Interval, TimeOfDay, TimeRange, TimeslotError, WeeklySchedule};

fn utc(month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, month, day, hour, minute, 0).unwrap()
}

fn range(text: &str) -> TimeRange {
    text.parse().unwrap()
}

/// Monday 09:00-12:00 in New York.
fn monday_mornings() -> WeeklySchedule {
    WeeklySchedule::new(New_York).set_day(Weekday::Mon, [range("09:00-12:00")])
}

// ---------------------------------------------------------------------------
// Time of day
// ---------------------------------------------------------------------------

#[test]
fn time_of_day_parses_with_and_without_seconds() {
    assert_eq!("09:30".parse::<TimeOfDay>().unwrap(), TimeOfDay::hm(9, 30));
    assert_eq!("9:05:07".parse::<TimeOfDay>().unwrap(), TimeOfDay::new(9, 5, 7));
}

#[test]
fn time_of_day_rejects_bad_input() {
    for bad in ["", "9", "24:00", "12:60", "12:00:60", "ab:cd", "1:2:3:4"] {
        assert!(
            matches!(bad.parse::<TimeOfDay>(), Err(TimeslotError::InvalidRange(_))),
            "'{}' should be rejected",
            bad
        );
    }
}

#[test]
fn time_of_day_orders_chronologically() {
    assert!(TimeOfDay::hm(9, 0) < TimeOfDay::hm(9, 1));
    assert!(TimeOfDay::new(9, 0, 59) < TimeOfDay::hm(9, 1));
}

#[test]
fn time_range_parse_and_display() {
    let r = range("09:00-17:30");
    assert_eq!(r.start, TimeOfDay::hm(9, 0));
    assert_eq!(r.end, TimeOfDay::hm(17, 30));
    assert_eq!(r.to_string(), "09:00-17:30");
}

#[test]
fn time_range_must_end_after_start() {
    assert!(matches!(
        "10:00-09:00".parse::<TimeRange>(),
        Err(TimeslotError::InvalidRange(_))
    ));
    assert!("10:00-10:00".parse::<TimeRange>().is_err());
    assert!("10:00".parse::<TimeRange>().is_err());
}

#[test]
fn time_range_serializes_as_string() {
    let json = serde_json::to_string(&range("09:00-17:00")).unwrap();
    assert_eq!(json, "\"09:00-17:00\"");
    let back: TimeRange = serde_json::from_str(&json).unwrap();
    assert_eq!(back, range("09:00-17:00"));
    assert!(serde_json::from_str::<TimeRange>("\"17:00-09:00\"").is_err());
}

// ---------------------------------------------------------------------------
// Day ranges
// ---------------------------------------------------------------------------

#[test]
fn set_day_sorts_and_coalesces() {
    let schedule = WeeklySchedule::new(Tz::UTC).set_day(
        Weekday::Tue,
        [range("13:00-14:00"), range("09:00-10:00"), range("10:00-11:00")],
    );
    assert_eq!(
        schedule.get_day(Weekday::Tue),
        &[range("09:00-11:00"), range("13:00-14:00")]
    );
    assert!(schedule.get_day(Weekday::Mon).is_empty());
}

#[test]
fn set_day_drops_invalid_ranges() {
    let reversed = TimeRange::new(TimeOfDay::hm(15, 0), TimeOfDay::hm(14, 0));
    let schedule = WeeklySchedule::new(Tz::UTC).set_day(Weekday::Wed, [reversed, range("09:00-10:00")]);
    assert_eq!(schedule.get_day(Weekday::Wed), &[range("09:00-10:00")]);
    assert!(schedule.validate().is_ok());
}

#[test]
fn set_day_replaces_previous_ranges() {
    let schedule = monday_mornings().set_day(Weekday::Mon, [range("14:00-15:00")]);
    assert_eq!(schedule.get_day(Weekday::Mon), &[range("14:00-15:00")]);
}

#[test]
fn empty_schedule_defaults_to_utc() {
    let schedule = WeeklySchedule::default();
    assert!(schedule.is_empty());
    assert_eq!(schedule.timezone(), Tz::UTC);
    assert_eq!(schedule.timezone_tag(), None);
    assert_eq!(schedule.dst_policy(), DstPolicy::ShiftForward);
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

#[test]
fn generate_slots_projects_in_schedule_timezone() {
    let slots = monday_mornings().generate_slots(utc(1, 6, 0, 0), utc(1, 13, 0, 0));
    // 09:00-12:00 EST is 14:00-17:00 UTC.
    assert_eq!(
        slots.as_slice(),
        &[Interval::new_in(utc(1, 6, 14, 0), utc(1, 6, 17, 0), New_York).unwrap()]
    );
}

#[test]
fn generate_slots_clips_to_window() {
    let slots = monday_mornings().generate_slots(utc(1, 6, 15, 0), utc(1, 6, 16, 0));
    assert_eq!(slots.len(), 1);
    assert_eq!(slots.as_slice()[0].start(), utc(1, 6, 15, 0));
    assert_eq!(slots.as_slice()[0].end(), utc(1, 6, 16, 0));
}

#[test]
fn generate_slots_with_reversed_window_is_empty() {
    assert!(monday_mornings()
        .generate_slots(utc(1, 13, 0, 0), utc(1, 6, 0, 0))
        .is_empty());
}

#[test]
fn is_available_respects_half_open_end() {
    let schedule = monday_mornings();
    assert!(schedule.is_available(utc(1, 6, 14, 0)));
    assert!(schedule.is_available(utc(1, 6, 16, 59)));
    assert!(!schedule.is_available(utc(1, 6, 17, 0)));
    assert!(!schedule.is_available(utc(1, 7, 15, 0)));
}

#[test]
fn next_available_finds_following_start() {
    let schedule = monday_mornings();
    assert_eq!(schedule.next_available(utc(1, 5, 12, 0)), Some(utc(1, 6, 14, 0)));
    assert_eq!(schedule.next_available(utc(1, 6, 15, 0)), Some(utc(1, 6, 15, 0)));
    assert_eq!(schedule.next_available(utc(1, 6, 17, 0)), Some(utc(1, 13, 14, 0)));
    assert_eq!(WeeklySchedule::new(Tz::UTC).next_available(utc(1, 6, 0, 0)), None);
}

#[test]
fn merge_with_unions_each_day() {
    let other = WeeklySchedule::default()
        .set_day(Weekday::Mon, [range("11:00-13:00")])
        .set_day(Weekday::Fri, [range("08:00-09:00")]);
    let merged = monday_mornings().merge_with(&other);
    assert_eq!(merged.get_day(Weekday::Mon), &[range("09:00-13:00")]);
    assert_eq!(merged.get_day(Weekday::Fri), &[range("08:00-09:00")]);
    assert_eq!(merged.timezone(), New_York);
}

#[test]
fn merge_with_falls_back_to_other_timezone() {
    let merged = WeeklySchedule::default().merge_with(&monday_mornings());
    assert_eq!(merged.timezone(), New_York);
}

// ---------------------------------------------------------------------------
// DST
// ---------------------------------------------------------------------------

/// 2025-03-09 is a Sunday; New York clocks jump from 02:00 to 03:00.
fn spring_forward_sunday(policy: DstPolicy) -> WeeklySchedule {
    WeeklySchedule::new(New_York)
        .with_dst_policy(policy)
        .set_day(Weekday::Sun, [range("02:30-04:00")])
}

#[test]
fn shift_forward_moves_start_out_of_the_gap() {
    let slots = spring_forward_sunday(DstPolicy::ShiftForward)
        .generate_slots(utc(3, 9, 0, 0), utc(3, 10, 0, 0));
    // 03:00 EDT is 07:00 UTC, 04:00 EDT is 08:00 UTC.
    assert_eq!(slots.len(), 1);
    assert_eq!(slots.as_slice()[0].start(), utc(3, 9, 7, 0));
    assert_eq!(slots.as_slice()[0].end(), utc(3, 9, 8, 0));
}

#[test]
fn skip_drops_ranges_starting_in_the_gap() {
    let slots = spring_forward_sunday(DstPolicy::Skip).generate_slots(utc(3, 9, 0, 0), utc(3, 10, 0, 0));
    assert!(slots.is_empty());
}

#[test]
fn wall_clock_is_kept_across_transition() {
    let schedule = WeeklySchedule::new(New_York)
        .set_day(Weekday::Fri, [range("09:00-10:00")])
        .set_day(Weekday::Mon, [range("09:00-10:00")]);
    // Friday before the change is EST, Monday after is EDT.
    let slots = schedule.generate_slots(utc(3, 7, 0, 0), utc(3, 11, 0, 0));
    let starts: Vec<DateTime<Utc>> = slots.iter().map(Interval::start).collect();
    assert_eq!(starts, vec![utc(3, 7, 14, 0), utc(3, 10, 13, 0)]);
}
