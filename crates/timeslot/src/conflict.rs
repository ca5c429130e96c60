//! Detect scheduling conflicts for a candidate slot across providers.
//!
//! A slot conflicts with a provider when it is not free ([`ConflictKind::Overlap`]),
//! when its buffered form is not free ([`ConflictKind::Buffer`], opt-in), or
//! when it overlaps an existing booking ([`ConflictKind::DoubleBooking`],
//! unless double booking is allowed). Adjacent slots are never conflicts.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::Serialize;

use crate::error::{Result, TimeslotError};
use crate::interval::Interval;
use crate::provider::{find_any, find_common, Provider};
use crate::query::Query;

/// How far around a slot existing bookings are searched for double bookings.
const DOUBLE_BOOKING_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    Overlap,
    Buffer,
    DoubleBooking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    ShiftForward,
    ShiftBackward,
    Skip,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResolutionStrategy::ShiftForward => "shift-forward",
            ResolutionStrategy::ShiftBackward => "shift-backward",
            ResolutionStrategy::Skip => "skip",
        })
    }
}

impl FromStr for ResolutionStrategy {
    type Err = TimeslotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "shift-forward" => Ok(ResolutionStrategy::ShiftForward),
            "shift-backward" => Ok(ResolutionStrategy::ShiftBackward),
            "skip" => Ok(ResolutionStrategy::Skip),
            other => Err(TimeslotError::UnknownResolutionStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionOption {
    pub strategy: ResolutionStrategy,
    pub description: &'static str,
}

/// A detected conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub slot: Interval,
    /// Ids of the providers involved.
    pub providers: Vec<String>,
    pub resolutions: Vec<ResolutionOption>,
}

impl Conflict {
    fn new(kind: ConflictKind, slot: Interval, provider: &Provider) -> Self {
        Self {
            kind,
            slot,
            providers: vec![provider.id().to_string()],
            resolutions: default_resolutions(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DetectorOptions {
    /// Also report slots whose buffered form is not free.
    pub include_buffers: bool,
    pub allow_double_booking: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    providers: Vec<Provider>,
    options: DetectorOptions,
}

impl ConflictDetector {
    pub fn new(providers: impl IntoIterator<Item = Provider>) -> Self {
        Self {
            providers: providers.into_iter().collect(),
            options: DetectorOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: DetectorOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn add_provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn options(&self) -> DetectorOptions {
        self.options
    }

    /// Conflicts between `slot` and a single provider.
    pub fn check(&self, slot: &Interval, provider: &Provider) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        if !provider.is_available(slot) {
            conflicts.push(Conflict::new(ConflictKind::Overlap, slot.clone(), provider));
        }
        if self.options.include_buffers {
            let buffered = provider.effective_interval(slot);
            if buffered != *slot && !provider.is_available(&buffered) {
                conflicts.push(Conflict::new(ConflictKind::Buffer, buffered, provider));
            }
        }
        if !self.options.allow_double_booking {
            let window = Duration::hours(DOUBLE_BOOKING_WINDOW_HOURS);
            let nearby = provider.bookings_between(slot.start() - window, slot.end() + window);
            if nearby.overlaps(slot) {
                conflicts.push(Conflict::new(
                    ConflictKind::DoubleBooking,
                    slot.clone(),
                    provider,
                ));
            }
        }
        conflicts
    }

    /// Conflicts between `slot` and every registered provider.
    pub fn check_all(&self, slot: &Interval) -> Vec<Conflict> {
        self.providers
            .iter()
            .flat_map(|provider| self.check(slot, provider))
            .collect()
    }

    /// Time that no registered provider has a conflict in.
    pub fn find_conflict_free(&self, query: &Query) -> Vec<Interval> {
        self.find_common_availability(query)
    }

    pub fn find_available_slots(&self, query: &Query) -> BTreeMap<String, Vec<Interval>> {
        find_any(&self.providers, query)
    }

    pub fn find_common_availability(&self, query: &Query) -> Vec<Interval> {
        find_common(&self.providers, query)
    }

    /// Apply `strategy` to the conflicting slot.
    pub fn resolve(&self, conflict: &Conflict, strategy: ResolutionStrategy) -> Option<Interval> {
        resolve(conflict, strategy)
    }
}

/// Move the conflicting slot by its own duration, or give up for
/// [`ResolutionStrategy::Skip`].
pub fn resolve(conflict: &Conflict, strategy: ResolutionStrategy) -> Option<Interval> {
    let length = conflict.slot.duration();
    match strategy {
        ResolutionStrategy::ShiftForward => Some(conflict.slot.shift(length)),
        ResolutionStrategy::ShiftBackward => Some(conflict.slot.shift(-length)),
        ResolutionStrategy::Skip => None,
    }
}

fn default_resolutions() -> Vec<ResolutionOption> {
    vec![
        ResolutionOption {
            strategy: ResolutionStrategy::ShiftForward,
            description: "Shift to next slot",
        },
        ResolutionOption {
            strategy: ResolutionStrategy::ShiftBackward,
            description: "Shift to previous slot",
        },
        ResolutionOption {
            strategy: ResolutionStrategy::Skip,
            description: "Skip this slot",
        },
    ]
}
