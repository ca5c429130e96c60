//! Sorted, non-overlapping interval sets.
//!
//! An [`IntervalCollection`] always holds its intervals sorted by start, with
//! no two overlapping and no two touching: construction sorts the input by
//! `(start, end)` and makes one left-to-right sweep, merging each pair whose
//! union is defined (overlapping or adjacent). Every operation returns a new
//! collection that satisfies the same invariants.

use std::slice;

use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::interval::Interval;

/// An immutable, normalized set of intervals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Interval>", into = "Vec<Interval>")]
pub struct IntervalCollection {
    intervals: Vec<Interval>,
}

impl IntervalCollection {
    /// Build a normalized collection from raw, possibly overlapping intervals.
    pub fn new(intervals: impl IntoIterator<Item = Interval>) -> Self {
        Self {
            intervals: normalize(intervals.into_iter().collect()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// A collection holding a single interval.
    pub fn single(interval: Interval) -> Self {
        Self {
            intervals: vec![interval],
        }
    }

    /// The carried default timezone: the first interval's, or UTC if empty.
    pub fn timezone(&self) -> Tz {
        self.intervals
            .first()
            .map(Interval::timezone)
            .unwrap_or(Tz::UTC)
    }

    /// Concatenate with the existing intervals and renormalize.
    #[must_use]
    pub fn add(&self, intervals: impl IntoIterator<Item = Interval>) -> Self {
        Self::new(self.intervals.iter().cloned().chain(intervals))
    }

    /// Subtract each interval in turn.
    #[must_use]
    pub fn remove(&self, intervals: impl IntoIterator<Item = Interval>) -> Self {
        intervals
            .into_iter()
            .fold(self.clone(), |acc, cut| acc.subtract(&Self::single(cut)))
    }

    /// Re-run normalization. Idempotent on an already normalized collection.
    #[must_use]
    pub fn merge(&self) -> Self {
        Self::new(self.intervals.iter().cloned())
    }

    /// Remove every instant covered by `other`.
    ///
    /// Each cut splits an overlapping interval into at most two pieces: the
    /// part before the cut's start and the part after the cut's end.
    #[must_use]
    pub fn subtract(&self, other: &IntervalCollection) -> Self {
        let mut remaining = self.intervals.clone();
        for cut in &other.intervals {
            let mut next = Vec::with_capacity(remaining.len() + 1);
            for piece in remaining {
                if !piece.overlaps(cut) {
                    next.push(piece);
                    continue;
                }
                if cut.start() > piece.start() {
                    next.push(Interval::from_parts(
                        piece.start(),
                        cut.start(),
                        piece.timezone_tag(),
                        piece.metadata().clone(),
                    ));
                }
                if cut.end() < piece.end() {
                    next.push(Interval::from_parts(
                        cut.end(),
                        piece.end(),
                        piece.timezone_tag(),
                        piece.metadata().clone(),
                    ));
                }
            }
            remaining = next;
        }
        Self::new(remaining)
    }

    /// Instants covered by both collections.
    ///
    /// Two-pointer sweep: emit the intersection of the current pair, then
    /// advance whichever side ends first (the right side on ties).
    #[must_use]
    pub fn intersect(&self, other: &IntervalCollection) -> Self {
        let (a, b) = (&self.intervals, &other.intervals);
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            if let Some(common) = a[i].intersection(&b[j]) {
                out.push(common);
            }
            if a[i].end() < b[j].end() {
                i += 1;
            } else {
                j += 1;
            }
        }
        Self::new(out)
    }

    /// Instants covered by either collection.
    #[must_use]
    pub fn union(&self, other: &IntervalCollection) -> Self {
        self.add(other.intervals.iter().cloned())
    }

    /// Keep the intervals matching `predicate`, in order.
    #[must_use]
    pub fn filter(&self, mut predicate: impl FnMut(&Interval) -> bool) -> Self {
        Self {
            intervals: self
                .intervals
                .iter()
                .filter(|interval| predicate(interval))
                .cloned()
                .collect(),
        }
    }

    /// Every stored interval that overlaps `target`.
    ///
    /// Because the set is sorted and disjoint, the matches are contiguous: a
    /// binary search finds the first interval ending after `target.start`, and a
    /// linear scan stops at the first one starting at or after `target.end`.
    pub fn find_overlaps(&self, target: &Interval) -> &[Interval] {
        let lower = self
            .intervals
            .partition_point(|interval| interval.end() <= target.start());
        let upper = lower
            + self.intervals[lower..]
                .iter()
                .take_while(|interval| interval.start() < target.end())
                .count();
        &self.intervals[lower..upper]
    }

    pub fn overlaps(&self, target: &Interval) -> bool {
        !self.find_overlaps(target).is_empty()
    }

    pub fn total_duration(&self) -> Duration {
        self.intervals
            .iter()
            .fold(Duration::zero(), |acc, interval| acc + interval.duration())
    }

    /// The parts of `within` not covered by this collection.
    #[must_use]
    pub fn gaps(&self, within: &Interval) -> Self {
        let base = Self::single(within.clone());
        let covered = base.intersect(self);
        base.subtract(&covered)
    }

    pub fn first(&self) -> Option<&Interval> {
        self.intervals.first()
    }

    pub fn last(&self) -> Option<&Interval> {
        self.intervals.last()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Interval> {
        self.intervals.iter()
    }

    pub fn as_slice(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn into_vec(self) -> Vec<Interval> {
        self.intervals
    }
}

/// Sort by `(start, end)`, then coalesce overlapping or touching neighbours.
fn normalize(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort_by_key(|interval| (interval.start(), interval.end()));

    let mut iter = intervals.into_iter();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    for next in iter {
        match current.union(&next) {
            Ok(joined) => current = joined,
            Err(_) => {
                merged.push(current);
                current = next;
            }
        }
    }
    merged.push(current);
    merged
}

impl From<Vec<Interval>> for IntervalCollection {
    fn from(intervals: Vec<Interval>) -> Self {
        Self::new(intervals)
    }
}

impl From<IntervalCollection> for Vec<Interval> {
    fn from(collection: IntervalCollection) -> Self {
        collection.intervals
    }
}

impl FromIterator<Interval> for IntervalCollection {
    fn from_iter<I: IntoIterator<Item = Interval>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl IntoIterator for IntervalCollection {
    type Item = Interval;
    type IntoIter = std::vec::IntoIter<Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.into_iter()
    }
}

impl<'a> IntoIterator for &'a IntervalCollection {
    type Item = &'a Interval;
    type IntoIter = slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}
