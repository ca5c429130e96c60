//! Provider description loaded from a TOML file.
//!
//! ```toml
//! id = "dr-lee"
//! timezone = "America/New_York"
//! buffer_before_minutes = 10
//! buffer_after_minutes = 10
//! min_notice_minutes = 120
//! max_advance_days = 30
//! blocked_dates = ["2025-01-20"]
//!
//! [weekly]
//! monday = ["09:00-12:00", "13:00-17:00"]
//! friday = ["09:00-12:00"]
//!
//! [[blocked_ranges]]
//! start = "2025-01-08T13:00:00-05:00"
//! end = "2025-01-08T15:00:00-05:00"
//!
//! [[overrides]]
//! date = "2025-01-11"
//! ranges = ["10:00-14:00"]
//!
//! [[bookings]]
//! start = "2025-01-06T15:00:00Z"
//! end = "2025-01-06T16:00:00Z"
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::Deserialize;
use timeslot::timezone::{midnight, parse_timezone};
use timeslot::{Availability, Interval, Provider, TimeRange, WeeklySchedule};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub id: String,
    /// IANA name; UTC when omitted.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub buffer_before_minutes: i64,
    #[serde(default)]
    pub buffer_after_minutes: i64,
    #[serde(default)]
    pub min_notice_minutes: i64,
    /// `0` disables the limit.
    #[serde(default)]
    pub max_advance_days: i64,
    #[serde(default)]
    pub weekly: WeeklyConfig,
    /// `YYYY-MM-DD`, blocked for the whole local day.
    #[serde(default)]
    pub blocked_dates: Vec<String>,
    #[serde(default)]
    pub blocked_ranges: Vec<RangeConfig>,
    #[serde(default)]
    pub overrides: Vec<OverrideConfig>,
    #[serde(default)]
    pub bookings: Vec<RangeConfig>,
}

/// `"HH:MM-HH:MM"` ranges per lowercase weekday.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeeklyConfig {
    pub monday: Vec<String>,
    pub tuesday: Vec<String>,
    pub wednesday: Vec<String>,
    pub thursday: Vec<String>,
    pub friday: Vec<String>,
    pub saturday: Vec<String>,
    pub sunday: Vec<String>,
}

impl WeeklyConfig {
    fn days(&self) -> [(Weekday, &'static str, &[String]); 7] {
        [
            (Weekday::Mon, "monday", &self.monday),
            (Weekday::Tue, "tuesday", &self.tuesday),
            (Weekday::Wed, "wednesday", &self.wednesday),
            (Weekday::Thu, "thursday", &self.thursday),
            (Weekday::Fri, "friday", &self.friday),
            (Weekday::Sat, "saturday", &self.saturday),
            (Weekday::Sun, "sunday", &self.sunday),
        ]
    }
}

/// An absolute `[start, end)` window given as RFC 3339 strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeConfig {
    pub start: String,
    pub end: String,
}

/// A date opened in full (no `ranges`) or given replacement ranges.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideConfig {
    pub date: String,
    #[serde(default)]
    pub ranges: Vec<String>,
}

impl ProviderConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse provider TOML")
    }

    /// Validate every field and build the provider it describes.
    pub fn into_provider(self) -> Result<Provider> {
        if self.id.trim().is_empty() {
            bail!("id: must not be empty");
        }
        let tz = match self.timezone.as_deref() {
            Some(name) => parse_timezone(name).context("timezone")?,
            None => Tz::UTC,
        };

        let mut weekly = WeeklySchedule::new(tz);
        for (day, field, ranges) in self.weekly.days() {
            let parsed = parse_ranges(&format!("weekly.{}", field), ranges)?;
            weekly = weekly.set_day(day, parsed);
        }

        let mut availability = Availability::new(tz).with_weekly_schedule(weekly);

        let blocked = self
            .blocked_dates
            .iter()
            .enumerate()
            .map(|(i, value)| local_day(&format!("blocked_dates[{}]", i), value, tz))
            .collect::<Result<Vec<_>>>()?;
        availability = availability.add_blocked_dates(blocked);

        for (i, range) in self.blocked_ranges.iter().enumerate() {
            let (start, end) = parse_window(&format!("blocked_ranges[{}]", i), range)?;
            availability = availability.add_blocked_range(start, end);
        }

        for (i, entry) in self.overrides.iter().enumerate() {
            let field = format!("overrides[{}]", i);
            let date = local_day(&format!("{}.date", field), &entry.date, tz)?;
            let ranges = parse_ranges(&format!("{}.ranges", field), &entry.ranges)?;
            availability = availability.add_available_override(date, ranges);
        }

        let bookings = self
            .bookings
            .iter()
            .enumerate()
            .map(|(i, range)| {
                let field = format!("bookings[{}]", i);
                let (start, end) = parse_window(&field, range)?;
                Interval::new_in(start, end, tz).with_context(|| field.clone())
            })
            .collect::<Result<Vec<_>>>()?;
        availability = availability.add_bookings(bookings);

        Ok(Provider::new(self.id)
            .with_availability(availability)
            .with_buffer_before(minutes("buffer_before_minutes", self.buffer_before_minutes)?)
            .with_buffer_after(minutes("buffer_after_minutes", self.buffer_after_minutes)?)
            .with_min_notice(minutes("min_notice_minutes", self.min_notice_minutes)?)
            .with_max_advance(days("max_advance_days", self.max_advance_days)?))
    }
}

fn parse_ranges(field: &str, values: &[String]) -> Result<Vec<TimeRange>> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            value
                .parse::<TimeRange>()
                .with_context(|| format!("{}[{}]: '{}'", field, i, value))
        })
        .collect()
}

fn local_day(field: &str, value: &str, tz: Tz) -> Result<DateTime<Tz>> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("{}: expected YYYY-MM-DD, got '{}'", field, value))?;
    let Some(start) = midnight(date, tz) else {
        bail!("{}: {} has no midnight in {}", field, value, tz.name());
    };
    Ok(start.with_timezone(&tz))
}

fn parse_window(field: &str, range: &RangeConfig) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = parse_instant(&range.start).with_context(|| format!("{}.start", field))?;
    let end = parse_instant(&range.end).with_context(|| format!("{}.end", field))?;
    if end <= start {
        bail!("{}: end must be after start", field);
    }
    Ok((start, end))
}

/// Parse an RFC 3339 instant.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value.trim())
        .with_context(|| format!("expected an RFC 3339 timestamp, got '{}'", value))?
        .with_timezone(&Utc))
}

fn non_negative(field: &str, value: i64) -> Result<i64> {
    if value < 0 {
        bail!("{}: must not be negative, got {}", field, value);
    }
    Ok(value)
}

fn minutes(field: &str, value: i64) -> Result<Duration> {
    match Duration::try_minutes(non_negative(field, value)?) {
        Some(duration) => Ok(duration),
        None => bail!("{}: out of range, got {}", field, value),
    }
}

fn days(field: &str, value: i64) -> Result<Duration> {
    match Duration::try_days(non_negative(field, value)?) {
        Some(duration) => Ok(duration),
        None => bail!("{}: out of range, got {}", field, value),
    }
}
