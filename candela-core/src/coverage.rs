//! Priority-ordered coverage planning.
//!
//! Given a requested window and the ranges each source advertises, produce
//! the list of disjoint claims that covers as much of the window as
//! possible, always preferring faster sources. The planner is pure; the
//! engine's chain driver executes the claims sequentially.

use crate::types::{TimeRange, join_ranges};

/// What one source advertises for a series.
#[derive(Debug, Clone)]
pub struct SourceCoverage {
    /// Speed rank; lower claims first.
    pub priority: u8,
    /// Sub-ranges the source can serve. Overlaps and unsorted input are fine.
    pub ranges: Vec<TimeRange>,
}

/// One planned unit of work: a source index and the range it will serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    /// Index into the slice handed to [`plan_coverage`].
    pub source: usize,
    /// The disjoint sub-range claimed by that source.
    pub range: TimeRange,
}

/// Plan coverage of `requested` across `sources`.
///
/// Sources are visited by ascending `priority`, ties broken by registration
/// index, and each claims the intersection of its advertised ranges with
/// whatever is still uncovered. Claims in the result are sorted by start
/// time, never overlap, and adjacent claims by the same source are merged
/// into one. Portions no source covers are simply absent.
#[must_use]
pub fn plan_coverage(requested: TimeRange, sources: &[SourceCoverage]) -> Vec<Claim> {
    let mut order: Vec<usize> = (0..sources.len()).collect();
    order.sort_by_key(|&i| (sources[i].priority, i));

    let mut uncovered = vec![requested];
    let mut claims: Vec<Claim> = Vec::new();

    for idx in order {
        if uncovered.is_empty() {
            break;
        }
        for advertised in join_ranges(sources[idx].ranges.clone()) {
            let mut remaining = Vec::with_capacity(uncovered.len());
            for gap in &uncovered {
                if let Some(hit) = gap.intersect(&advertised) {
                    claims.push(Claim {
                        source: idx,
                        range: hit,
                    });
                    remaining.extend(gap.exclude(&advertised));
                } else {
                    remaining.push(*gap);
                }
            }
            uncovered = remaining;
        }
    }

    claims.sort_by_key(|c| (c.range.start(), c.range.end()));

    // Adjacent claims by the same source collapse into one start call.
    let mut merged: Vec<Claim> = Vec::with_capacity(claims.len());
    for claim in claims {
        match merged.last_mut() {
            Some(last) if last.source == claim.source && last.range.touches(&claim.range) => {
                last.range = last.range.hull(&claim.range);
            }
            _ => merged.push(claim),
        }
    }
    merged
}
