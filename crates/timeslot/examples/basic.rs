//! Morning slots for a stylist over the next two weeks.
//!
//! ```bash
//! cargo run -p timeslot --example basic
//! ```

use chrono::{Duration, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use timeslot::{Provider, Query, TimeRange, WeeklySchedule};

fn main() -> timeslot::Result<()> {
    let weekly = WeeklySchedule::new(Tz::UTC)
        .set_day(Weekday::Tue, ["09:00-17:00".parse::<TimeRange>()?])
        .set_day(Weekday::Thu, ["10:00-14:00".parse::<TimeRange>()?]);

    let holidays = [(2024, 12, 25), (2024, 12, 26)]
        .into_iter()
        .filter_map(|(y, m, d)| Tz::UTC.with_ymd_and_hms(y, m, d, 0, 0, 0).single());

    let provider = Provider::new("stylist-1")
        .with_weekly_schedule(weekly)
        .with_buffer(Duration::minutes(15))
        .with_min_notice(Duration::hours(2))
        .with_blocked_dates(holidays);

    let now = Utc::now();
    let query = Query::builder()
        .duration(Duration::hours(1))
        .between(now, now + Duration::days(14))
        .only_mornings()
        .prefer_earlier()
        .limit(5)
        .build();

    println!("Available slots:");
    for slot in provider.find_slots(&query)? {
        println!(
            "  {} - {}",
            slot.local_start().format("%a %b %-d %H:%M"),
            slot.local_end().format("%H:%M")
        );
    }
    Ok(())
}
