use std::time::Duration;

use candela_core::CandleStore;
use candela_types::{BucketRule, Candle, CandleState, Instrument, SeriesKey, TimeRange};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

fn series() -> SeriesKey {
    SeriesKey::new(
        Instrument::new("TEST"),
        BucketRule::TimeFrame(Duration::from_secs(60)),
        TimeRange::new(at(0), at(86_400)).unwrap(),
    )
}

fn candle(open_secs: i64, state: CandleState) -> Candle {
    let t = at(open_secs);
    let price = Decimal::from(100 + open_secs % 10);
    Candle {
        instrument: Instrument::new("TEST"),
        rule: BucketRule::TimeFrame(Duration::from_secs(60)),
        open_time: t,
        close_time: at(open_secs + 59),
        high_time: t,
        low_time: t,
        open: price,
        high: price,
        low: price,
        close: price,
        open_volume: None,
        high_volume: None,
        low_volume: None,
        close_volume: None,
        total_volume: Decimal::ONE,
        buy_volume: None,
        sell_volume: None,
        relative_volume: None,
        total_price: price,
        total_ticks: Some(1),
        up_ticks: None,
        down_ticks: None,
        open_interest: None,
        price_levels: None,
        state,
    }
}

#[test]
fn unknown_series_rejects_adds() {
    let store = CandleStore::new(Duration::ZERO);
    assert!(!store.add(&series(), candle(0, CandleState::Finished)));
    assert_eq!(store.candle_count(&series()), 0);
}

#[test]
fn active_snapshots_collapse_and_finish_in_place() {
    let store = CandleStore::new(Duration::ZERO);
    let key = series();
    store.start(&key);

    assert!(store.add(&key, candle(0, CandleState::Active)));
    let mut updated = candle(0, CandleState::Active);
    updated.close = Decimal::from(105);
    assert!(store.add(&key, updated));
    assert_eq!(store.candle_count(&key), 1);
    assert_eq!(
        store.candles_at(&key, at(0))[0].close,
        Decimal::from(105)
    );

    assert!(store.add(&key, candle(0, CandleState::Finished)));
    assert_eq!(store.candle_count(&key), 1);
    assert!(store.candles_at(&key, at(0))[0].is_finished());

    // Replaying the identical finished candle changes nothing.
    assert!(!store.add(&key, candle(0, CandleState::Finished)));
    assert_eq!(store.candle_count(&key), 1);
}

#[test]
fn queries_return_oldest_first() {
    let store = CandleStore::new(Duration::ZERO);
    let key = series();
    store.start(&key);
    for m in 0..5 {
        store.add(&key, candle(m * 60, CandleState::Finished));
    }

    let last = store.last_n(&key, 2);
    assert_eq!(last.len(), 2);
    assert_eq!(last[0].open_time, at(180));
    assert_eq!(last[1].open_time, at(240));

    let window = store.candles_in(&key, TimeRange::new(at(60), at(180)).unwrap());
    assert_eq!(window.len(), 3);
    assert_eq!(window[0].open_time, at(60));

    assert_eq!(store.candle_from_end(&key, 0).unwrap().open_time, at(240));
    assert_eq!(store.candle_from_end(&key, 4).unwrap().open_time, at(0));
    assert!(store.candle_from_end(&key, 5).is_none());
}

#[test]
fn retention_sweep_fires_at_one_and_a_half_keep_windows() {
    // keep = 10 minutes; the sweep triggers once the span exceeds 15.
    let store = CandleStore::new(Duration::from_secs(600));
    let key = series();
    store.start(&key);

    for m in 0..=15 {
        store.add(&key, candle(m * 60, CandleState::Finished));
    }
    // Span is exactly 15 minutes, still within the slack.
    assert_eq!(store.candle_count(&key), 16);

    store.add(&key, candle(16 * 60, CandleState::Finished));
    // Everything older than latest - keep = minute 6 is gone.
    assert_eq!(store.candle_count(&key), 11);
    assert!(store.candles_at(&key, at(0)).is_empty());
    assert!(store.candles_at(&key, at(5 * 60)).is_empty());
    assert!(!store.candles_at(&key, at(6 * 60)).is_empty());
}

#[test]
fn sweep_tracks_the_cutoff_not_the_first_surviving_candle() {
    let store = CandleStore::new(Duration::from_secs(600));
    let key = series();
    store.start(&key);

    for m in 0..=16 {
        store.add(&key, candle(m * 60, CandleState::Finished));
    }
    assert_eq!(store.candle_count(&key), 11);

    // The next sweep measures from the cutoff (minute 6), so it fires again
    // at minute 22, not at minute 21 + slack.
    for m in 17..=21 {
        store.add(&key, candle(m * 60, CandleState::Finished));
    }
    assert_eq!(store.candle_count(&key), 16);
    store.add(&key, candle(22 * 60, CandleState::Finished));
    assert_eq!(store.candle_count(&key), 11);
}

#[test]
fn retention_measures_from_the_window_start() {
    let store = CandleStore::new(Duration::from_secs(600));
    let key = series();
    store.start(&key);

    // The watermark starts at the window's lower bound (minute 0), so a
    // series whose data begins late sweeps on schedule: minute 16 already
    // exceeds the slack, minute 22 advances the cutoff to minute 12, and
    // minute 28 advances it to 18, evicting the first two candles.
    for m in 16..=28 {
        store.add(&key, candle(m * 60, CandleState::Finished));
    }
    assert_eq!(store.candle_count(&key), 11);
    assert!(store.candles_at(&key, at(16 * 60)).is_empty());
    assert!(store.candles_at(&key, at(17 * 60)).is_empty());
    assert!(!store.candles_at(&key, at(18 * 60)).is_empty());
}

#[test]
fn zero_keep_disables_eviction() {
    let store = CandleStore::new(Duration::ZERO);
    let key = series();
    store.start(&key);
    for m in 0..100 {
        store.add(&key, candle(m * 60, CandleState::Finished));
    }
    assert_eq!(store.candle_count(&key), 100);
}

#[test]
fn restart_clears_previous_content() {
    let store = CandleStore::new(Duration::ZERO);
    let key = series();
    store.start(&key);
    store.add(&key, candle(0, CandleState::Finished));
    store.start(&key);
    assert_eq!(store.candle_count(&key), 0);

    store.add(&key, candle(60, CandleState::Finished));
    store.reset(&key);
    assert_eq!(store.candle_count(&key), 0);
    assert!(store.add(&key, candle(120, CandleState::Finished)));

    store.remove(&key);
    assert!(!store.add(&key, candle(180, CandleState::Finished)));
}
