//! Bookable resources: availability plus booking policy.
//!
//! A [`Provider`] wraps an [`Availability`] with buffers around bookings and a
//! booking horizon (`min_notice`, `max_advance`). Like every other aggregate in
//! the crate it is an immutable value: booking or cancelling returns a new
//! provider and leaves the original untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::debug;

use crate::availability::Availability;
use crate::collection::IntervalCollection;
use crate::error::{Result, TimeslotError};
use crate::interval::{Interval, Metadata};
use crate::query::{optimize_slots, Query};
use crate::schedule::WeeklySchedule;

/// How far around a slot [`Provider::is_available`] resolves free time.
const AVAILABILITY_MARGIN_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    id: String,
    availability: Availability,
    buffer_before: Duration,
    buffer_after: Duration,
    min_notice: Duration,
    max_advance: Duration,
    metadata: Metadata,
}

impl Provider {
    /// A provider with no schedule, buffers or booking limits.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            availability: Availability::default(),
            buffer_before: Duration::zero(),
            buffer_after: Duration::zero(),
            min_notice: Duration::zero(),
            max_advance: Duration::zero(),
            metadata: Metadata::new(),
        }
    }

    #[must_use]
    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    #[must_use]
    pub fn with_weekly_schedule(mut self, weekly: WeeklySchedule) -> Self {
        self.availability = self.availability.with_weekly_schedule(weekly);
        self
    }

    /// Padding blocked before each booking. Negative values clamp to zero.
    #[must_use]
    pub fn with_buffer_before(mut self, buffer: Duration) -> Self {
        self.buffer_before = buffer.max(Duration::zero());
        self
    }

    /// Padding blocked after each booking. Negative values clamp to zero.
    #[must_use]
    pub fn with_buffer_after(mut self, buffer: Duration) -> Self {
        self.buffer_after = buffer.max(Duration::zero());
        self
    }

    /// Same padding on both sides.
    #[must_use]
    pub fn with_buffer(self, buffer: Duration) -> Self {
        self.with_buffer_before(buffer).with_buffer_after(buffer)
    }

    /// Minimum lead time between now and a booking's start. Zero disables it.
    #[must_use]
    pub fn with_min_notice(mut self, notice: Duration) -> Self {
        self.min_notice = notice;
        self
    }

    /// Maximum lead time between now and a booking's start. Zero disables it.
    #[must_use]
    pub fn with_max_advance(mut self, advance: Duration) -> Self {
        self.max_advance = advance;
        self
    }

    #[must_use]
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.availability = self.availability.with_timezone(tz);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_blocked_dates(mut self, dates: impl IntoIterator<Item = DateTime<Tz>>) -> Self {
        self.availability = self.availability.add_blocked_dates(dates);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    pub fn buffer_before(&self) -> Duration {
        self.buffer_before
    }

    pub fn buffer_after(&self) -> Duration {
        self.buffer_after
    }

    pub fn min_notice(&self) -> Duration {
        self.min_notice
    }

    pub fn max_advance(&self) -> Duration {
        self.max_advance
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn timezone(&self) -> Tz {
        self.availability.timezone()
    }

    /// Bookable candidates for `query`, best first.
    ///
    /// # Errors
    /// Returns the query's validation error.
    pub fn find_slots(&self, query: &Query) -> Result<Vec<Interval>> {
        query.validate()?;
        let candidates: Vec<Interval> = self
            .availability
            .slots(query.from, query.to)
            .iter()
            .flat_map(|free| free.split(query.duration))
            .filter(|candidate| candidate.duration() == query.duration)
            .map(|candidate| query.localize(candidate))
            .filter(|candidate| query.accepts(candidate) && self.clears_buffers(candidate))
            .collect();
        debug!(provider = %self.id, candidates = candidates.len(), "found candidate slots");
        Ok(optimize_slots(candidates, query))
    }

    /// Whether `slot` lies inside a single free interval and keeps the
    /// buffers around every existing booking clear.
    pub fn is_available(&self, slot: &Interval) -> bool {
        let margin = Duration::hours(AVAILABILITY_MARGIN_HOURS);
        let free = self
            .availability
            .slots(slot.start() - margin, slot.end() + margin);
        let inside = free.find_overlaps(slot).iter().any(|f| f.encloses(slot));
        inside && self.clears_buffers(slot)
    }

    /// Book `slot`, checking the policy against the current time.
    ///
    /// # Errors
    /// As [`Provider::book_at`].
    pub fn book(&self, slot: Interval) -> Result<Provider> {
        self.book_at(slot, Utc::now())
    }

    /// Book `slot` as if the current time were `now`.
    ///
    /// # Errors
    /// - [`TimeslotError::PastBooking`] when the slot starts before `now`
    /// - [`TimeslotError::InsufficientNotice`] when it starts within `min_notice`
    /// - [`TimeslotError::TooFarInAdvance`] when it starts after `max_advance`
    /// - [`TimeslotError::SlotUnavailable`] when it is not free
    pub fn book_at(&self, slot: Interval, now: DateTime<Utc>) -> Result<Provider> {
        if slot.start() < now {
            return Err(TimeslotError::PastBooking);
        }
        if self.min_notice > Duration::zero() && slot.start() < later(now, self.min_notice) {
            return Err(TimeslotError::InsufficientNotice);
        }
        if self.max_advance > Duration::zero() && slot.start() > later(now, self.max_advance) {
            return Err(TimeslotError::TooFarInAdvance);
        }
        if !self.is_available(&slot) {
            return Err(TimeslotError::SlotUnavailable);
        }
        debug!(provider = %self.id, slot = %slot, "booked slot");
        let mut booked = self.clone();
        booked.availability = booked.availability.add_booking(slot);
        Ok(booked)
    }

    /// Remove `slot` from the bookings.
    ///
    /// # Errors
    /// Returns [`TimeslotError::BookingNotFound`] when no booked time overlaps it.
    pub fn cancel_booking(&self, slot: &Interval) -> Result<Provider> {
        let remaining = self.availability.clone().remove_booking(slot);
        if remaining.bookings() == self.availability.bookings() {
            return Err(TimeslotError::BookingNotFound);
        }
        let mut cancelled = self.clone();
        cancelled.availability = remaining;
        Ok(cancelled)
    }

    /// Booked time within `[from, to)`.
    pub fn bookings_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> IntervalCollection {
        if to <= from {
            return IntervalCollection::empty();
        }
        let window = Interval::from_parts(from, to, Some(self.timezone()), Metadata::new());
        self.availability
            .bookings()
            .intersect(&IntervalCollection::single(window))
    }

    /// `slot` widened by the buffers: what it blocks once booked.
    pub fn effective_interval(&self, slot: &Interval) -> Interval {
        Interval::from_parts(
            earlier(slot.start(), self.buffer_before),
            later(slot.end(), self.buffer_after),
            slot.timezone_tag(),
            slot.metadata().clone(),
        )
    }

    /// No existing booking's buffered window overlaps `slot`, and `slot`'s
    /// buffered window overlaps no existing booking.
    fn clears_buffers(&self, slot: &Interval) -> bool {
        // Either direction reduces to overlapping `slot` widened by the larger
        // buffer on both sides.
        let widest = self.buffer_before.max(self.buffer_after);
        let reach = Interval::from_parts(
            earlier(slot.start(), widest),
            later(slot.end(), widest),
            slot.timezone_tag(),
            Metadata::new(),
        );
        self.availability
            .bookings()
            .find_overlaps(&reach)
            .iter()
            .all(|existing| {
                !self.effective_interval(existing).overlaps(slot)
                    && !existing.overlaps(&self.effective_interval(slot))
            })
    }
}

/// Slots per provider id. Providers whose search fails are left out.
pub fn find_any(providers: &[Provider], query: &Query) -> BTreeMap<String, Vec<Interval>> {
    providers
        .iter()
        .filter_map(|provider| match provider.find_slots(query) {
            Ok(slots) => Some((provider.id.clone(), slots)),
            Err(e) => {
                debug!(provider = %provider.id, error = %e, "skipping provider");
                None
            }
        })
        .collect()
}

/// Time every provider can offer. Empty when there are no providers or any
/// provider's search fails.
pub fn find_common(providers: &[Provider], query: &Query) -> Vec<Interval> {
    let mut common: Option<IntervalCollection> = None;
    for provider in providers {
        let Ok(slots) = provider.find_slots(query) else {
            return Vec::new();
        };
        let slots = IntervalCollection::new(slots);
        common = Some(match common {
            Some(acc) => acc.intersect(&slots),
            None => slots,
        });
    }
    common.map(IntervalCollection::into_vec).unwrap_or_default()
}

/// `instant + by`, saturating at the end of representable time.
fn later(instant: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    instant.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `instant - by`, saturating at the start of representable time.
fn earlier(instant: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    instant.checked_sub_signed(by).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
