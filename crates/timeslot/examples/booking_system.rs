//! Find, book and cancel a meeting room slot.
//!
//! ```bash
//! cargo run -p timeslot --example booking_system
//! ```

use std::error::Error;

use chrono::{DateTime, Duration, Utc, Weekday};
use chrono_tz::Tz;
use timeslot::{ConflictDetector, DetectorOptions, Provider, Query, TimeRange, WeeklySchedule};

fn main() -> Result<(), Box<dyn Error>> {
    let weekly = WeeklySchedule::new(Tz::UTC).set_day(Weekday::Mon, ["09:00-17:00".parse::<TimeRange>()?]);
    let room = Provider::new("room-1")
        .with_weekly_schedule(weekly)
        .with_buffer(Duration::minutes(15));

    // Monday 3 February 2025, booked as of the previous Friday.
    let from: DateTime<Utc> = "2025-02-03T00:00:00Z".parse()?;
    let now = from - Duration::days(3);
    let query = Query::builder()
        .duration(Duration::hours(1))
        .between(from, from + Duration::days(1))
        .limit(3)
        .build();

    let slots = room.find_slots(&query)?;
    println!("Found {} candidate slots", slots.len());
    let Some(first) = slots.first().cloned() else {
        return Ok(());
    };

    let booked = room.book_at(first.clone(), now)?;
    println!("Booked: {}", first);
    println!("Remaining slots: {}", booked.find_slots(&query)?.len());

    // The buffer makes the back-to-back hour conflict with the booking.
    let next = first.shift(Duration::hours(1));
    let detector = ConflictDetector::new([booked.clone()]).with_options(DetectorOptions {
        include_buffers: true,
        allow_double_booking: false,
    });
    for conflict in detector.check_all(&next) {
        println!("Conflict for {}: {:?}", next, conflict.kind);
    }

    let cancelled = booked.cancel_booking(&first)?;
    println!("After cancelling: {} slots", cancelled.find_slots(&query)?.len());
    Ok(())
}
