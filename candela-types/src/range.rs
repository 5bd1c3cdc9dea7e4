use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::CandelaError;

/// A closed time interval `[min, max]` with nanosecond granularity.
///
/// Ranges are the unit of coverage accounting: sources advertise the ranges
/// they can serve, the planner claims sub-ranges out of a request, and
/// claimed ranges never overlap (exclusion steps past the boundary by one
/// nanosecond, the smallest representable tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeRange {
    min: DateTime<Utc>,
    max: DateTime<Utc>,
}

impl TimeRange {
    /// Construct a range, validating `min <= max`.
    ///
    /// # Errors
    /// Returns `CandelaError::InvalidRange` when the bounds are inverted.
    pub fn new(min: DateTime<Utc>, max: DateTime<Utc>) -> Result<Self, CandelaError> {
        if min > max {
            return Err(CandelaError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Lower bound (inclusive).
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.min
    }

    /// Upper bound (inclusive).
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.max
    }

    /// Length of the interval.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.max - self.min
    }

    /// Whether `t` lies inside the closed interval.
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.min <= t && t <= self.max
    }

    /// Intersection of two closed intervals, `None` when disjoint.
    ///
    /// Commutative: `a.intersect(&b) == b.intersect(&a)`.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(Self { min, max })
    }

    /// Subtract `other` from `self`, yielding the 0, 1, or 2 leftover parts.
    ///
    /// Leftovers abut the removed span at one-nanosecond distance, so a
    /// subsequent [`join_ranges`] will not re-merge them with it. When the
    /// intervals are disjoint the result is `self` unchanged;
    /// `a.exclude(&a)` is empty.
    #[must_use]
    pub fn exclude(&self, other: &Self) -> Vec<Self> {
        let Some(hit) = self.intersect(other) else {
            return vec![*self];
        };
        let mut out = Vec::with_capacity(2);
        if self.min < hit.min {
            out.push(Self {
                min: self.min,
                max: hit.min - Duration::nanoseconds(1),
            });
        }
        if hit.max < self.max {
            out.push(Self {
                min: hit.max + Duration::nanoseconds(1),
                max: self.max,
            });
        }
        out
    }

    /// Whether `other` starts where `self` ends (within one nanosecond) or
    /// overlaps it, i.e. the two can be merged into one interval.
    #[must_use]
    pub fn touches(&self, other: &Self) -> bool {
        other.min <= self.max + Duration::nanoseconds(1) && self.min <= other.max
    }

    /// Smallest interval covering both `self` and `other`.
    #[must_use]
    pub fn hull(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {}]", self.min, self.max)
    }
}

/// Merge overlapping and adjacent ranges into a minimal sorted cover.
///
/// Input order does not matter; the output is sorted by lower bound and no
/// two output ranges touch.
#[must_use]
pub fn join_ranges(mut ranges: Vec<TimeRange>) -> Vec<TimeRange> {
    if ranges.len() <= 1 {
        return ranges;
    }
    ranges.sort();
    let mut out: Vec<TimeRange> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match out.last_mut() {
            Some(last) if last.touches(&r) => {
                last.max = last.max.max(r.max);
            }
            _ => out.push(r),
        }
    }
    out
}
