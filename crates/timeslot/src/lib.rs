//! # timeslot
//!
//! Calendar availability from recurring weekly schedules, date exceptions,
//! buffers and bookings.
//!
//! The core is an interval algebra over half-open `[start, end)` windows and
//! a resolver that layers a weekly template, date-specific overrides and
//! existing bookings into a single sorted, non-overlapping set of free time.
//! Around it sit a query layer for bookable slots, providers with booking
//! policy, conflict detection, and iCalendar import/export with recurrence
//! expansion via the `rrule` crate.
//!
//! ## Modules
//!
//! - [`interval`]: half-open windows with timezone and metadata
//! - [`collection`]: sorted, coalesced interval sets (merge, subtract, intersect)
//! - [`schedule`]: weekly time-of-day templates
//! - [`exceptions`]: blocked, available and modified date overrides
//! - [`availability`]: resolution of schedule + exceptions + bookings
//! - [`query`]: slot search criteria, constraints and preferences
//! - [`provider`]: bookable resources with buffers and booking limits
//! - [`conflict`]: conflict detection and resolution strategies
//! - [`recurrence`]: RRULE parsing and expansion
//! - [`ical`]: iCalendar parsing and export
//! - [`timezone`], [`dst`]: timezone and DST helpers
//! - [`error`]: error types

pub mod availability;
pub mod collection;
pub mod conflict;
pub mod dst;
pub mod error;
pub mod exceptions;
pub mod ical;
pub mod interval;
pub mod provider;
pub mod query;
pub mod recurrence;
pub mod schedule;
pub mod timezone;

pub use availability::Availability;
pub use collection::IntervalCollection;
pub use conflict::{Conflict, ConflictDetector, ConflictKind, DetectorOptions, ResolutionStrategy};
pub use dst::DstPolicy;
pub use error::{Result, TimeslotError};
pub use exceptions::{DateOverride, DateRange, ExceptionSet};
pub use ical::{Calendar, Event, EventStatus};
pub use interval::{Interval, Metadata};
pub use provider::{find_any, find_common, Provider};
pub use query::{optimize_slots, Constraint, Preference, Query, QueryBuilder};
pub use recurrence::{Frequency, Rule};
pub use schedule::{TimeOfDay, TimeRange, WeeklySchedule};
