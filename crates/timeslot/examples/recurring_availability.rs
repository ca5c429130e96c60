//! Expand a weekly rule across a DST change and export it as iCalendar.
//!
//! ```bash
//! cargo run -p timeslot --example recurring_availability
//! ```

use chrono::{Duration, TimeZone};
use chrono_tz::America::New_York;
use timeslot::dst::{is_dst, is_dst_transition_day};
use timeslot::ical::export_intervals;
use timeslot::timezone::local_date;
use timeslot::{Interval, Rule};

fn main() -> timeslot::Result<()> {
    let rule: Rule = "FREQ=WEEKLY;INTERVAL=1;BYDAY=MO,WE,FR;COUNT=10".parse()?;
    let Some(start) = New_York.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).single() else {
        return Ok(());
    };

    let mut sessions = Vec::new();
    for occurrence in rule.generate(start, 10)? {
        let local = occurrence.with_timezone(&New_York);
        let date = local_date(occurrence, New_York);
        println!(
            "{}  {}{}",
            local.to_rfc3339(),
            if is_dst(occurrence, New_York) { "EDT" } else { "EST" },
            if is_dst_transition_day(date, New_York) { "  (clocks change today)" } else { "" }
        );
        sessions.push(Interval::new_in(occurrence, occurrence + Duration::hours(1), New_York)?);
    }

    // 9:00 stays 9:00 local, so the UTC start moves by an hour after 9 March.
    print!("\n{}", export_intervals(&sessions, "Office hours"));
    Ok(())
}
