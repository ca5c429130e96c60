//! Tests for availability resolution: schedule, exceptions and bookings layered
//! into free time.

use chrono::{DateTime, Duration, TimeZone, Utc, Weekday};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use timeslot::{Availability, Interval, IntervalCollection, TimeRange, TimeslotError, WeeklySchedule};

// ── Helpers ─────────────────────────────────────────────────────────────────

/// An instant in January 2025. The 6th is a Monday.
fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, hour, minute, 0).unwrap()
}

fn utc_date(day: u32) -> DateTime<Tz> {
    Tz::UTC.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
}

fn range(text: &str) -> TimeRange {
    text.parse().unwrap()
}

fn iv(day: u32, start: (u32, u32), end: (u32, u32)) -> Interval {
    Interval::new_in(utc(day, start.0, start.1), utc(day, end.0, end.1), Tz::UTC).unwrap()
}

fn bounds(slots: &IntervalCollection) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    slots.iter().map(|i| (i.start(), i.end())).collect()
}

fn monday_mornings() -> Availability {
    Availability::new(Tz::UTC)
        .with_weekly_schedule(WeeklySchedule::new(Tz::UTC).set_day(Weekday::Mon, [range("09:00-12:00")]))
}

fn every_day(ranges: &str) -> WeeklySchedule {
    [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
    .into_iter()
    .fold(WeeklySchedule::new(Tz::UTC), |schedule, day| {
        schedule.set_day(day, [range(ranges)])
    })
}

// ── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn booking_splits_the_free_window() {
    let availability = monday_mornings().add_booking(iv(6, (10, 0), (11, 0)));
    let slots = availability.slots(utc(6, 0, 0), utc(7, 0, 0));
    assert_eq!(
        bounds(&slots),
        vec![(utc(6, 9, 0), utc(6, 10, 0)), (utc(6, 11, 0), utc(6, 12, 0))]
    );
}

#[test]
fn modified_override_replaces_the_weekly_ranges() {
    let availability = Availability::new(Tz::UTC)
        .with_weekly_schedule(every_day("00:00-23:59"))
        .add_available_override(utc_date(6), [range("11:00-12:00")]);
    let slots = availability.slots(utc(6, 0, 0), utc(7, 0, 0));
    assert_eq!(bounds(&slots), vec![(utc(6, 11, 0), utc(6, 12, 0))]);
}

#[test]
fn hour_long_slots_fill_a_two_hour_window() {
    let availability = Availability::new(Tz::UTC)
        .with_weekly_schedule(WeeklySchedule::new(Tz::UTC).set_day(Weekday::Mon, [range("09:00-11:00")]));
    let slots = availability.find_available_slots(Duration::hours(1), utc(6, 0, 0), utc(7, 0, 0));
    assert_eq!(slots, vec![iv(6, (9, 0), (10, 0)), iv(6, (10, 0), (11, 0))]);
}

#[test]
fn reversed_window_is_empty() {
    let availability = monday_mornings();
    assert!(availability.slots(utc(7, 0, 0), utc(6, 0, 0)).is_empty());
    assert!(availability.slots(utc(6, 0, 0), utc(6, 0, 0)).is_empty());
}

// ── Slot generation ─────────────────────────────────────────────────────────

#[test]
fn partial_remainders_are_dropped() {
    let slots = monday_mornings().find_available_slots(Duration::minutes(90), utc(6, 0, 0), utc(7, 0, 0));
    assert_eq!(slots, vec![iv(6, (9, 0), (10, 30)), iv(6, (10, 30), (12, 0))]);

    let slots = monday_mornings().find_available_slots(Duration::minutes(120), utc(6, 0, 0), utc(7, 0, 0));
    assert_eq!(slots, vec![iv(6, (9, 0), (11, 0))]);
}

#[test]
fn non_positive_duration_yields_nothing() {
    let availability = monday_mornings();
    assert!(availability
        .find_available_slots(Duration::zero(), utc(6, 0, 0), utc(7, 0, 0))
        .is_empty());
    assert!(availability
        .find_available_slots(Duration::minutes(-30), utc(6, 0, 0), utc(7, 0, 0))
        .is_empty());
}

#[test]
fn window_clips_generated_ranges() {
    let slots = monday_mornings().slots(utc(6, 10, 30), utc(6, 11, 0));
    assert_eq!(bounds(&slots), vec![(utc(6, 10, 30), utc(6, 11, 0))]);
}

#[test]
fn resolves_in_the_aggregate_timezone() {
    let availability = Availability::new(New_York)
        .with_weekly_schedule(WeeklySchedule::new(New_York).set_day(Weekday::Mon, [range("09:00-12:00")]));
    let slots = availability.slots(utc(6, 0, 0), utc(7, 0, 0));
    assert_eq!(bounds(&slots), vec![(utc(6, 14, 0), utc(6, 17, 0))]);
    assert_eq!(slots.timezone(), New_York);
}

#[test]
fn timezone_falls_back_to_the_schedule() {
    let availability = Availability::default()
        .with_weekly_schedule(WeeklySchedule::new(New_York).set_day(Weekday::Mon, [range("09:00-12:00")]));
    assert_eq!(availability.timezone(), New_York);
    assert_eq!(Availability::default().timezone(), Tz::UTC);
}

#[test]
fn with_timezone_retimes_the_schedule_too() {
    let availability = monday_mornings().with_timezone(New_York);
    assert_eq!(availability.weekly().timezone(), New_York);
    let slots = availability.slots(utc(6, 0, 0), utc(7, 0, 0));
    assert_eq!(bounds(&slots), vec![(utc(6, 14, 0), utc(6, 17, 0))]);
}

// ── Exceptions ──────────────────────────────────────────────────────────────

#[test]
fn blocked_date_removes_the_day() {
    let availability = monday_mornings().add_blocked_dates([utc_date(6)]);
    assert!(availability.slots(utc(6, 0, 0), utc(7, 0, 0)).is_empty());
    assert_eq!(availability.slots(utc(13, 0, 0), utc(14, 0, 0)).len(), 1);
}

#[test]
fn blocked_range_cuts_part_of_the_day() {
    let availability = monday_mornings().add_blocked_range(utc(6, 9, 30), utc(6, 10, 0));
    let slots = availability.slots(utc(6, 0, 0), utc(7, 0, 0));
    assert_eq!(
        bounds(&slots),
        vec![(utc(6, 9, 0), utc(6, 9, 30)), (utc(6, 10, 0), utc(6, 12, 0))]
    );
}

#[test]
fn invalid_blocked_range_is_ignored_during_resolution() {
    let availability = monday_mornings().add_blocked_range(utc(6, 11, 0), utc(6, 10, 0));
    assert_eq!(availability.slots(utc(6, 0, 0), utc(7, 0, 0)).len(), 1);
    assert!(matches!(availability.validate(), Err(TimeslotError::InvalidRange(_))));
}

#[test]
fn blocked_date_still_applies_on_a_modified_date() {
    let availability = monday_mornings()
        .add_available_override(utc_date(6), [range("14:00-15:00")])
        .add_blocked_dates([utc_date(6)]);
    assert!(availability.slots(utc(6, 0, 0), utc(7, 0, 0)).is_empty());
}

#[test]
fn available_override_opens_a_day_off() {
    // The 11th is a Saturday.
    let availability = monday_mornings().add_available_override(utc_date(11), Vec::<TimeRange>::new());
    let slots = availability.slots(utc(11, 8, 0), utc(11, 20, 0));
    assert_eq!(bounds(&slots), vec![(utc(11, 8, 0), utc(11, 20, 0))]);
}

#[test]
fn available_override_never_reopens_a_booking() {
    let availability = monday_mornings()
        .add_available_override(utc_date(11), Vec::<TimeRange>::new())
        .add_booking(iv(11, (12, 0), (13, 0)));
    let slots = availability.slots(utc(11, 0, 0), utc(12, 0, 0));
    assert_eq!(
        bounds(&slots),
        vec![(utc(11, 0, 0), utc(11, 12, 0)), (utc(11, 13, 0), utc(12, 0, 0))]
    );
}

// ── Point queries ───────────────────────────────────────────────────────────

#[test]
fn is_available_and_is_booked() {
    let availability = monday_mornings().add_booking(iv(6, (10, 0), (11, 0)));
    assert!(availability.is_available(utc(6, 9, 0)));
    assert!(!availability.is_available(utc(6, 10, 30)));
    assert!(availability.is_available(utc(6, 11, 0)));
    assert!(!availability.is_available(utc(6, 12, 0)));

    assert!(availability.is_booked(utc(6, 10, 0)));
    assert!(!availability.is_booked(utc(6, 11, 0)));
    assert!(!availability.is_booked(utc(6, 9, 0)));
}

#[test]
fn remove_booking_frees_the_window() {
    let booked = monday_mornings().add_booking(iv(6, (10, 0), (11, 0)));
    let freed = booked.clone().remove_booking(&iv(6, (10, 0), (11, 0)));
    assert!(freed.bookings().is_empty());
    assert_eq!(
        bounds(&freed.slots(utc(6, 0, 0), utc(7, 0, 0))),
        vec![(utc(6, 9, 0), utc(6, 12, 0))]
    );
    // The original value is untouched.
    assert_eq!(booked.bookings().len(), 1);
}

#[test]
fn add_bookings_merges_touching_bookings() {
    let availability = monday_mornings().add_bookings([iv(6, (9, 0), (10, 0)), iv(6, (10, 0), (10, 30))]);
    assert_eq!(availability.bookings().len(), 1);
    assert_eq!(
        bounds(&availability.slots(utc(6, 0, 0), utc(7, 0, 0))),
        vec![(utc(6, 10, 30), utc(6, 12, 0))]
    );
}

#[test]
fn validate_passes_for_a_clean_aggregate() {
    let availability = monday_mornings()
        .add_booking(iv(6, (10, 0), (11, 0)))
        .add_blocked_dates([utc_date(13)]);
    assert!(availability.validate().is_ok());
}

#[test]
fn resolves_multiple_weeks() {
    let availability = Availability::new(Tz::UTC).with_weekly_schedule(every_day("09:00-17:00"));
    let slots = availability.slots(utc(1, 0, 0), utc(29, 0, 0));
    assert_eq!(slots.len(), 28);
    assert_eq!(slots.total_duration(), Duration::hours(8 * 28));
}
