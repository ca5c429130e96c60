//! iCalendar (RFC 5545) import and export on top of the `icalendar` crate.
//!
//! Parsing, unfolding and text escaping are left to `icalendar`; this module
//! maps its `VEVENT`s onto [`Event`]s with resolved timezones, recurrence
//! rules and exception dates, and turns them into busy time.
//!
//! # Key design decisions
//!
//! - **Lenient timezones**: an unknown `TZID` falls back to the calendar
//!   timezone (`X-WR-TIMEZONE`, else UTC) with a warning instead of failing
//!   the whole file. Floating times are read in the calendar timezone.
//! - **Error positions**: event-level errors report the 1-based line of the
//!   offending `BEGIN:VEVENT`. Syntax errors raised by the parser carry no
//!   position and report line 0.

use std::fs;
use std::io::{BufRead, Read};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, EventLike};
use tracing::{debug, warn};

use crate::availability::Availability;
use crate::collection::IntervalCollection;
use crate::dst::{localize, DstPolicy};
use crate::error::{Result, TimeslotError};
use crate::interval::{Interval, Metadata};
use crate::recurrence::Rule;
use crate::schedule::{clip, WeeklySchedule};
use crate::timezone::parse_timezone;

/// Calendar name used when exporting without one.
pub const DEFAULT_EXPORT_NAME: &str = "Timeslot Export";

const EXPORT_SUMMARY: &str = "Available Slot";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

impl From<icalendar::EventStatus> for EventStatus {
    fn from(status: icalendar::EventStatus) -> Self {
        match status {
            icalendar::EventStatus::Tentative => EventStatus::Tentative,
            icalendar::EventStatus::Confirmed => EventStatus::Confirmed,
            icalendar::EventStatus::Cancelled => EventStatus::Cancelled,
        }
    }
}

/// A parsed `VEVENT`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub uid: String,
    pub summary: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    /// `DTSTART` was a date without a time.
    pub all_day: bool,
    pub recurrence: Option<Rule>,
    pub exceptions: Vec<DateTime<Utc>>,
    pub status: EventStatus,
}

impl Event {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Busy intervals of this event overlapping `[from, to)`, clipped to it.
    fn busy_within(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Interval> {
        let duration = self.duration();
        if duration <= Duration::zero() {
            debug!(uid = %self.uid, "skipping event without duration");
            return Vec::new();
        }
        let tz = self.start.timezone();
        let starts = match &self.recurrence {
            None => vec![self.start.with_timezone(&Utc)],
            // Occurrences that start before `from` may still overlap it.
            Some(rule) => match rule.generate_between_with_exdates(
                self.start,
                from - duration,
                to,
                &self.exceptions,
            ) {
                Ok(starts) => starts,
                Err(e) => {
                    warn!(uid = %self.uid, error = %e, "skipping unexpandable recurrence");
                    return Vec::new();
                }
            },
        };
        starts
            .into_iter()
            .map(|start| Interval::from_parts(start, start + duration, Some(tz), Metadata::new()))
            .filter_map(|interval| clip(&interval, from, to))
            .collect()
    }
}

/// A parsed `VCALENDAR`.
#[derive(Debug, Clone, PartialEq)]
pub struct Calendar {
    pub name: String,
    pub timezone: Tz,
    pub events: Vec<Event>,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            name: String::new(),
            timezone: Tz::UTC,
            events: Vec::new(),
        }
    }
}

impl Calendar {
    /// # Errors
    /// Returns [`TimeslotError::InvalidIcs`] when the text is not iCalendar,
    /// or an event has no usable `DTSTART` or a malformed `RRULE`/`EXDATE`.
    pub fn parse(text: &str) -> Result<Self> {
        let parsed = text
            .parse::<icalendar::Calendar>()
            .map_err(|message| TimeslotError::InvalidIcs { line: 0, message })?;

        let mut calendar = Calendar::default();
        for property in &parsed.properties {
            match property.key() {
                "X-WR-CALNAME" | "NAME" if calendar.name.is_empty() => {
                    calendar.name = property.value().to_string();
                }
                "X-WR-TIMEZONE" => match parse_timezone(property.value()) {
                    Ok(tz) => calendar.timezone = tz,
                    Err(e) => warn!(error = %e, "ignoring calendar timezone"),
                },
                _ => {}
            }
        }

        let events = parsed.iter().filter_map(|component| match component {
            CalendarComponent::Event(event) => Some(event),
            _ => None,
        });
        for (index, event) in events.enumerate() {
            let converted = convert_event(event, calendar.timezone).map_err(|message| {
                TimeslotError::InvalidIcs {
                    line: event_line(text, index),
                    message,
                }
            })?;
            calendar.events.push(converted);
        }
        debug!(events = calendar.events.len(), name = %calendar.name, "parsed calendar");
        Ok(calendar)
    }

    /// # Errors
    /// Returns [`TimeslotError::Io`] when reading fails, otherwise as [`Calendar::parse`].
    pub fn parse_reader(mut reader: impl BufRead) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::parse(&text)
    }

    /// # Errors
    /// Returns [`TimeslotError::Io`] when the file cannot be read, otherwise as
    /// [`Calendar::parse`].
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Busy time of every non-cancelled event within `[from, to)`, with
    /// recurrences expanded and exception dates skipped.
    pub fn busy_intervals(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> IntervalCollection {
        if to <= from {
            return IntervalCollection::empty();
        }
        self.events
            .iter()
            .filter(|event| event.status != EventStatus::Cancelled)
            .flat_map(|event| event.busy_within(from, to))
            .collect()
    }

    /// All busy time as bookings of an availability in the calendar timezone.
    ///
    /// Unbounded recurrences stop at [`crate::recurrence::MAX_OCCURRENCES`].
    pub fn to_availability(&self) -> Availability {
        let availability = Availability::new(self.timezone);
        let Some(from) = self
            .events
            .iter()
            .map(|event| event.start.with_timezone(&Utc))
            .min()
        else {
            return availability;
        };
        availability.add_bookings(self.busy_intervals(from, far_future()))
    }

    /// The schedule's slots within `[from, to)` minus this calendar's busy time.
    pub fn free_intervals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        weekly: &WeeklySchedule,
    ) -> IntervalCollection {
        weekly
            .generate_slots(from, to)
            .subtract(&self.busy_intervals(from, to))
    }
}

impl FromStr for Calendar {
    type Err = TimeslotError;

    fn from_str(s: &str) -> Result<Self> {
        Calendar::parse(s)
    }
}

/// Render intervals as a `VCALENDAR` with one `VEVENT` per interval.
///
/// An empty `name` becomes [`DEFAULT_EXPORT_NAME`].
pub fn export_intervals<'a>(intervals: impl IntoIterator<Item = &'a Interval>, name: &str) -> String {
    let name = if name.is_empty() {
        DEFAULT_EXPORT_NAME
    } else {
        name
    };
    let mut calendar = icalendar::Calendar::new();
    calendar.name(name);
    for (i, interval) in intervals.into_iter().enumerate() {
        calendar.push(
            icalendar::Event::new()
                .uid(&format!("timeslot-{}@local", i + 1))
                .summary(EXPORT_SUMMARY)
                .starts(interval.start())
                .ends(interval.end())
                .done(),
        );
    }
    calendar.to_string()
}

/// Export the free time of `availability` within `[from, to)`.
pub fn export_availability(
    availability: &Availability,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> String {
    export_intervals(&availability.slots(from, to), "Availability")
}

fn convert_event(event: &icalendar::Event, fallback: Tz) -> std::result::Result<Event, String> {
    let Some(start) = event.get_start() else {
        return Err(match event.property_value("DTSTART") {
            Some(value) => format!("unsupported date-time '{}'", value),
            None => "VEVENT has no DTSTART".to_string(),
        });
    };
    let (start, all_day) = resolve(start, fallback)?;
    let end = match event.get_end() {
        Some(end) => resolve(end, fallback)?.0,
        None if all_day => start + Duration::days(1),
        None => start,
    };

    let recurrence = event
        .property_value("RRULE")
        .map(Rule::parse)
        .transpose()
        .map_err(|e| e.to_string())?;

    let mut exceptions = Vec::new();
    if let Some(property) = event.properties().get("EXDATE") {
        let tz = match property.params().get("TZID") {
            Some(tzid) => zone_or(tzid.value(), fallback),
            None => fallback,
        };
        for value in property.value().split(',') {
            let instant = parse_exdate(value.trim(), tz)
                .ok_or_else(|| format!("unsupported date-time '{}'", value.trim()))?;
            exceptions.push(instant);
        }
    }

    Ok(Event {
        uid: event.get_uid().unwrap_or_default().to_string(),
        summary: event.get_summary().unwrap_or_default().to_string(),
        start,
        end,
        all_day,
        recurrence,
        exceptions,
        status: event.get_status().map(EventStatus::from).unwrap_or_default(),
    })
}

/// Resolve a `DTSTART`/`DTEND` value to an instant in its own timezone. The
/// flag is set for date-only values, which start at local midnight.
fn resolve(value: DatePerhapsTime, fallback: Tz) -> std::result::Result<(DateTime<Tz>, bool), String> {
    let (naive, tz, all_day) = match value {
        DatePerhapsTime::Date(date) => (date.and_time(NaiveTime::MIN), fallback, true),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(instant)) => {
            return Ok((instant.with_timezone(&Tz::UTC), false));
        }
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => (naive, fallback, false),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            (date_time, zone_or(&tzid, fallback), false)
        }
    };
    let instant = localize(naive.date(), naive.time(), tz, DstPolicy::ShiftForward)
        .ok_or_else(|| format!("{} does not exist in {}", naive, tz.name()))?;
    Ok((instant.with_timezone(&tz), all_day))
}

fn zone_or(tzid: &str, fallback: Tz) -> Tz {
    parse_timezone(tzid).unwrap_or_else(|e| {
        warn!(error = %e, "unknown TZID, using calendar timezone");
        fallback
    })
}

/// One `EXDATE` value: `YYYYMMDDTHHMMSSZ`, floating `YYYYMMDDTHHMMSS` read in
/// `tz`, or `YYYYMMDD` for local midnight.
fn parse_exdate(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").ok()?;
        return Some(Utc.from_utc_datetime(&naive));
    }
    let naive = match NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S") {
        Ok(naive) => naive,
        Err(_) => NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()?
            .and_time(NaiveTime::MIN),
    };
    localize(naive.date(), naive.time(), tz, DstPolicy::ShiftForward)
}

/// 1-based line of the `index`th `BEGIN:VEVENT`, or 0 when it cannot be found.
fn event_line(text: &str, index: usize) -> usize {
    text.lines()
        .enumerate()
        .filter(|(_, line)| line.trim().eq_ignore_ascii_case("BEGIN:VEVENT"))
        .nth(index)
        .map_or(0, |(i, _)| i + 1)
}

fn far_future() -> DateTime<Utc> {
    let date = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX);
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
