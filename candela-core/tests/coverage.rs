use candela_core::{SourceCoverage, plan_coverage};
use candela_types::TimeRange;
use chrono::{DateTime, TimeZone, Utc};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

fn range(min_s: i64, max_s: i64) -> TimeRange {
    TimeRange::new(at(min_s), at(max_s)).unwrap()
}

fn cov(priority: u8, ranges: Vec<TimeRange>) -> SourceCoverage {
    SourceCoverage { priority, ranges }
}

#[test]
fn fast_source_takes_its_slice_slow_fills_around_it() {
    // A live builder only covers the middle of the request; storage covers
    // everything. The fast source keeps its slice, storage gets the rest.
    let requested = range(0, 100);
    let claims = plan_coverage(
        requested,
        &[
            cov(0, vec![range(30, 60)]),
            cov(1, vec![range(0, 100)]),
        ],
    );

    assert_eq!(claims.len(), 3);
    assert_eq!(claims[0].source, 1);
    assert_eq!(claims[0].range.start(), at(0));
    assert!(claims[0].range.end() < at(30));
    assert_eq!(claims[1].source, 0);
    assert_eq!(claims[1].range, range(30, 60));
    assert_eq!(claims[2].source, 1);
    assert!(claims[2].range.start() > at(60));
    assert_eq!(claims[2].range.end(), at(100));

    // Disjoint by construction.
    for pair in claims.windows(2) {
        assert!(pair[0].range.intersect(&pair[1].range).is_none());
    }
}

#[test]
fn lower_priority_wins_the_overlap() {
    let claims = plan_coverage(
        range(0, 100),
        &[cov(2, vec![range(0, 100)]), cov(0, vec![range(0, 100)])],
    );
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].source, 1);
    assert_eq!(claims[0].range, range(0, 100));
}

#[test]
fn equal_priority_ties_break_by_registration_order() {
    let claims = plan_coverage(
        range(0, 100),
        &[cov(1, vec![range(0, 100)]), cov(1, vec![range(0, 100)])],
    );
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].source, 0);
}

#[test]
fn uncoverable_portions_stay_unclaimed() {
    let claims = plan_coverage(
        range(0, 100),
        &[cov(0, vec![range(10, 20), range(80, 90)])],
    );
    assert_eq!(claims.len(), 2);
    assert_eq!(claims[0].range, range(10, 20));
    assert_eq!(claims[1].range, range(80, 90));
}

#[test]
fn no_sources_no_claims() {
    assert!(plan_coverage(range(0, 100), &[]).is_empty());
    assert!(plan_coverage(range(0, 100), &[cov(0, vec![])]).is_empty());
}

#[test]
fn overlapping_advertised_ranges_are_normalized_first() {
    let claims = plan_coverage(
        range(0, 100),
        &[cov(0, vec![range(0, 50), range(40, 100)])],
    );
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].range, range(0, 100));
}

#[test]
fn advertised_range_outside_request_is_clipped() {
    let claims = plan_coverage(range(50, 100), &[cov(0, vec![range(0, 70)])]);
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].range, range(50, 70));
}

#[test]
fn three_way_split_across_priorities() {
    // Live feed covers the tail, storage a middle slab, backfill everything.
    let claims = plan_coverage(
        range(0, 1_000),
        &[
            cov(0, vec![range(900, 1_000)]),
            cov(1, vec![range(300, 950)]),
            cov(2, vec![range(0, 1_000)]),
        ],
    );
    assert_eq!(claims.len(), 3);
    assert_eq!(claims[0].source, 2);
    assert_eq!(claims[1].source, 1);
    assert_eq!(claims[2].source, 0);
    assert_eq!(claims[2].range, range(900, 1_000));
    assert!(claims[1].range.end() < at(900));
    assert_eq!(claims[1].range.start(), at(300));
    assert!(claims[0].range.end() < at(300));
}
