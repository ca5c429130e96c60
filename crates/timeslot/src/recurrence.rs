//! Recurrence rules: a typed subset of RFC 5545 RRULE.
//!
//! A [`Rule`] is parsed from and rendered back to an RRULE value. Expansion is
//! delegated to the `rrule` crate: the rule is rendered into an iCalendar block
//! with a `DTSTART;TZID=` line (and `EXDATE;TZID=` when exclusions are given),
//! so recurrences keep their wall-clock time across DST transitions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use rrule::RRuleSet;
use tracing::warn;

use crate::error::{Result, TimeslotError};

/// Occurrences produced when the caller does not give a limit.
pub const DEFAULT_LIMIT: usize = 1000;

/// Hard cap on any single expansion. Longer expansions are truncated with a
/// warning.
pub const MAX_OCCURRENCES: usize = MAX_EXPANSION as usize;

const MAX_EXPANSION: u16 = u16::MAX;

const ICAL_LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        })
    }
}

impl FromStr for Frequency {
    type Err = TimeslotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            other => Err(TimeslotError::InvalidRule(format!(
                "unsupported frequency '{}'",
                other
            ))),
        }
    }
}

/// A recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub frequency: Frequency,
    /// Step between periods; `0` is treated as `1`.
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<DateTime<Utc>>,
    pub by_day: Vec<Weekday>,
    pub by_month: Vec<u32>,
    pub by_month_day: Vec<i32>,
    pub by_hour: Vec<u32>,
    pub by_minute: Vec<u32>,
}

impl Default for Rule {
    fn default() -> Self {
        Self::new(Frequency::Daily)
    }
}

impl Rule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            by_month: Vec::new(),
            by_month_day: Vec::new(),
            by_hour: Vec::new(),
            by_minute: Vec::new(),
        }
    }

    /// Parse an RRULE value such as `FREQ=WEEKLY;BYDAY=MO,WE`.
    ///
    /// Unknown keys are ignored.
    ///
    /// # Errors
    /// Returns [`TimeslotError::InvalidRule`] for malformed tokens, unsupported
    /// frequencies, bad numbers, weekday tokens or out-of-range filter values.
    pub fn parse(input: &str) -> Result<Self> {
        let mut rule = Rule::default();
        for part in input.trim().split(';').filter(|part| !part.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| TimeslotError::InvalidRule(format!("malformed token '{}'", part)))?;
            let value = value.trim();
            match key.trim().to_ascii_uppercase().as_str() {
                "FREQ" => rule.frequency = value.parse()?,
                "INTERVAL" => rule.interval = parse_number(key, value)?,
                "COUNT" => rule.count = Some(parse_number(key, value)?),
                "UNTIL" => rule.until = Some(parse_until(value)?),
                "BYDAY" => {
                    rule.by_day = value
                        .split(',')
                        .map(token_to_weekday)
                        .collect::<Result<_>>()?
                }
                "BYMONTH" => rule.by_month = parse_list(key, value)?,
                "BYMONTHDAY" => rule.by_month_day = parse_list(key, value)?,
                "BYHOUR" => rule.by_hour = parse_list(key, value)?,
                "BYMINUTE" => rule.by_minute = parse_list(key, value)?,
                _ => {}
            }
        }
        rule.by_month_day.sort_unstable();
        rule.validate()?;
        Ok(rule)
    }

    /// # Errors
    /// Returns [`TimeslotError::InvalidRule`] for out-of-range filter values.
    pub fn validate(&self) -> Result<()> {
        check_range("BYMONTH", &self.by_month, |m| (1..=12).contains(m))?;
        check_range("BYMONTHDAY", &self.by_month_day, |d| {
            *d != 0 && (-31..=31).contains(d)
        })?;
        check_range("BYHOUR", &self.by_hour, |h| *h <= 23)?;
        check_range("BYMINUTE", &self.by_minute, |m| *m <= 59)
    }

    /// Up to `limit` occurrences starting at `start` (`0` means
    /// [`DEFAULT_LIMIT`]), capped by `COUNT`.
    ///
    /// # Errors
    /// Returns [`TimeslotError::InvalidRule`] if the recurrence engine rejects
    /// the rule.
    pub fn generate(&self, start: DateTime<Tz>, limit: usize) -> Result<Vec<DateTime<Utc>>> {
        self.generate_with_exdates(start, limit, &[])
    }

    /// Like [`Rule::generate`], skipping occurrences that match an exception date.
    ///
    /// # Errors
    /// Returns [`TimeslotError::InvalidRule`] if the recurrence engine rejects
    /// the rule.
    pub fn generate_with_exdates(
        &self,
        start: DateTime<Tz>,
        limit: usize,
        exdates: &[DateTime<Utc>],
    ) -> Result<Vec<DateTime<Utc>>> {
        let mut limit = if limit == 0 { DEFAULT_LIMIT } else { limit };
        if let Some(count) = self.count {
            limit = limit.min(count as usize);
        }
        if limit == 0 {
            return Ok(Vec::new());
        }
        // The engine counts excluded dates against its limit.
        let cap = u16::try_from(limit.saturating_add(exdates.len())).unwrap_or(MAX_EXPANSION);
        let result = self.to_rrule_set(start, exdates)?.all(cap);
        if result.limited && cap == MAX_EXPANSION {
            warn!(rule = %self, cap = MAX_OCCURRENCES, "recurrence expansion truncated");
        }
        let mut out: Vec<DateTime<Utc>> = result
            .dates
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc))
            .collect();
        out.truncate(limit);
        Ok(out)
    }

    /// Occurrences in `[from, to)`.
    ///
    /// # Errors
    /// Returns [`TimeslotError::InvalidRule`] if the recurrence engine rejects
    /// the rule.
    pub fn generate_between(
        &self,
        start: DateTime<Tz>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        self.generate_between_with_exdates(start, from, to, &[])
    }

    /// Like [`Rule::generate_between`], skipping exception dates.
    ///
    /// # Errors
    /// Returns [`TimeslotError::InvalidRule`] if the recurrence engine rejects
    /// the rule.
    pub fn generate_between_with_exdates(
        &self,
        start: DateTime<Tz>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exdates: &[DateTime<Utc>],
    ) -> Result<Vec<DateTime<Utc>>> {
        if to <= from {
            return Ok(Vec::new());
        }
        let set = self
            .to_rrule_set(start, exdates)?
            .after((from - Duration::seconds(1)).with_timezone(&rrule::Tz::UTC))
            .before(to.with_timezone(&rrule::Tz::UTC));
        let result = set.all(MAX_EXPANSION);
        if result.limited {
            warn!(
                rule = %self,
                from = %from,
                to = %to,
                cap = MAX_OCCURRENCES,
                "recurrence expansion truncated"
            );
        }
        Ok(result
            .dates
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc))
            .filter(|dt| from <= *dt && *dt < to)
            .collect())
    }

    /// The first occurrence strictly after `after`.
    ///
    /// # Errors
    /// Returns [`TimeslotError::InvalidRule`] if the recurrence engine rejects
    /// the rule.
    pub fn next_after(
        &self,
        start: DateTime<Tz>,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let set = self
            .to_rrule_set(start, &[])?
            .after(after.with_timezone(&rrule::Tz::UTC));
        Ok(set
            .all(2)
            .dates
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc))
            .find(|dt| *dt > after))
    }

    /// Whether `instant` (read as local wall-clock time) passes every
    /// by-filter and is not past `UNTIL`.
    pub fn contains(&self, instant: DateTime<Tz>) -> bool {
        if self
            .until
            .is_some_and(|until| instant.with_timezone(&Utc) > until)
        {
            return false;
        }
        let matches = |values: &[u32], actual: u32| values.is_empty() || values.contains(&actual);
        (self.by_day.is_empty() || self.by_day.contains(&instant.weekday()))
            && matches(&self.by_month, instant.month())
            && (self.by_month_day.is_empty()
                || self.by_month_day.contains(&(instant.day() as i32)))
            && matches(&self.by_hour, instant.hour())
            && matches(&self.by_minute, instant.minute())
    }

    /// Render the rule, anchored at `start`, as an iCalendar block and parse
    /// it with the recurrence engine.
    fn to_rrule_set(&self, start: DateTime<Tz>, exdates: &[DateTime<Utc>]) -> Result<RRuleSet> {
        let tz = start.timezone();
        let mut text = format!(
            "DTSTART;TZID={}:{}\nRRULE:{}",
            tz.name(),
            start.format(ICAL_LOCAL_FORMAT),
            self.engine_rule(tz)
        );
        if !exdates.is_empty() {
            let locals: Vec<String> = exdates
                .iter()
                .map(|d| d.with_timezone(&tz).format(ICAL_LOCAL_FORMAT).to_string())
                .collect();
            text.push_str(&format!("\nEXDATE;TZID={}:{}", tz.name(), locals.join(",")));
        }
        text.parse::<RRuleSet>()
            .map_err(|e| TimeslotError::InvalidRule(e.to_string()))
    }

    /// The RRULE value handed to the engine. UNTIL must share DTSTART's
    /// timezone: UTC values end in `Z`, anything else is bare local time.
    fn engine_rule(&self, tz: Tz) -> String {
        let mut parts = self.filter_parts();
        parts.insert(0, format!("FREQ={}", self.frequency));
        parts.insert(1, format!("INTERVAL={}", self.interval.max(1)));
        if let Some(count) = self.count {
            parts.push(format!("COUNT={}", count));
        }
        if let Some(until) = self.until {
            let local = until.with_timezone(&tz).format(ICAL_LOCAL_FORMAT).to_string();
            if tz == Tz::UTC {
                parts.push(format!("UNTIL={}Z", local));
            } else {
                parts.push(format!("UNTIL={}", local));
            }
        }
        parts.join(";")
    }

    fn filter_parts(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if !self.by_day.is_empty() {
            let days: Vec<&str> = self.by_day.iter().map(|d| weekday_to_token(*d)).collect();
            parts.push(format!("BYDAY={}", days.join(",")));
        }
        push_list(&mut parts, "BYMONTH", &self.by_month);
        push_list(&mut parts, "BYMONTHDAY", &self.by_month_day);
        push_list(&mut parts, "BYHOUR", &self.by_hour);
        push_list(&mut parts, "BYMINUTE", &self.by_minute);
        parts
    }
}

impl FromStr for Rule {
    type Err = TimeslotError;

    fn from_str(s: &str) -> Result<Self> {
        Rule::parse(s)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![format!("FREQ={}", self.frequency)];
        if self.interval > 1 {
            parts.push(format!("INTERVAL={}", self.interval));
        }
        if let Some(count) = self.count {
            parts.push(format!("COUNT={}", count));
        }
        if let Some(until) = self.until {
            parts.push(format!("UNTIL={}", until.format("%Y%m%dT%H%M%SZ")));
        }
        parts.extend(self.filter_parts());
        f.write_str(&parts.join(";"))
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| TimeslotError::InvalidRule(format!("invalid {} value '{}'", key, value)))
}

fn parse_list<T: FromStr>(key: &str, value: &str) -> Result<Vec<T>> {
    value
        .split(',')
        .map(|item| parse_number(key, item.trim()))
        .collect()
}

fn check_range<T: fmt::Display>(key: &str, values: &[T], valid: impl Fn(&T) -> bool) -> Result<()> {
    match values.iter().find(|v| !valid(v)) {
        Some(bad) => Err(TimeslotError::InvalidRule(format!(
            "{} value {} out of range",
            key, bad
        ))),
        None => Ok(()),
    }
}

fn push_list<T: fmt::Display>(parts: &mut Vec<String>, key: &str, values: &[T]) {
    if !values.is_empty() {
        let joined: Vec<String> = values.iter().map(ToString::to_string).collect();
        parts.push(format!("{}={}", key, joined.join(",")));
    }
}

/// `YYYYMMDDTHHMMSSZ`, `YYYYMMDDTHHMMSS` or `YYYYMMDD`, all read as UTC.
fn parse_until(value: &str) -> Result<DateTime<Utc>> {
    let invalid = || TimeslotError::InvalidRule(format!("invalid UNTIL '{}'", value));
    let naive = if let Some(stripped) = value.strip_suffix('Z') {
        NaiveDateTime::parse_from_str(stripped, ICAL_LOCAL_FORMAT).map_err(|_| invalid())?
    } else if value.contains('T') {
        NaiveDateTime::parse_from_str(value, ICAL_LOCAL_FORMAT).map_err(|_| invalid())?
    } else {
        NaiveDate::parse_from_str(value, "%Y%m%d")
            .map_err(|_| invalid())?
            .and_time(chrono::NaiveTime::MIN)
    };
    Ok(Utc.from_utc_datetime(&naive))
}

fn token_to_weekday(token: &str) -> Result<Weekday> {
    match token.trim().to_ascii_uppercase().as_str() {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        _ => Err(TimeslotError::InvalidRule(format!(
            "invalid weekday '{}'",
            token
        ))),
    }
}

fn weekday_to_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}
