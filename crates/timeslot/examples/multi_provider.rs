//! Per-provider and common availability across three part-time staff.
//!
//! ```bash
//! cargo run -p timeslot --example multi_provider
//! ```

use chrono::{Duration, Utc, Weekday};
use chrono_tz::Tz;
use timeslot::{ConflictDetector, Provider, Query, TimeRange, WeeklySchedule};

fn staff(id: &str, days: &[Weekday]) -> timeslot::Result<Provider> {
    let hours: TimeRange = "09:00-17:00".parse()?;
    let weekly = days
        .iter()
        .fold(WeeklySchedule::new(Tz::UTC), |weekly, day| weekly.set_day(*day, [hours]));
    Ok(Provider::new(id).with_weekly_schedule(weekly))
}

fn main() -> timeslot::Result<()> {
    let detector = ConflictDetector::new([
        staff("alice", &[Weekday::Tue, Weekday::Wed, Weekday::Thu])?,
        staff("bob", &[Weekday::Mon, Weekday::Tue, Weekday::Fri])?,
        staff("carol", &[Weekday::Wed, Weekday::Thu, Weekday::Fri])?,
    ]);

    let now = Utc::now();
    let query = Query::builder()
        .duration(Duration::minutes(30))
        .between(now, now + Duration::days(7))
        .build();

    for (id, slots) in detector.find_available_slots(&query) {
        println!("{} has {} available slots", id, slots.len());
    }

    let common = detector.find_common_availability(&query);
    println!("\nTimes when everyone is available: {} slots", common.len());
    Ok(())
}
