use std::time::Duration;

use candela_core::{CandleBuilder, Compressor, candle_to_trades, decompose};
use candela_types::{BucketRule, Candle, CandleState, Instrument, Side};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

#[allow(clippy::too_many_arguments)]
fn minute_candle(
    open_secs: i64,
    open: &str,
    high: &str,
    low: &str,
    close: &str,
    volume: &str,
) -> Candle {
    Candle {
        instrument: Instrument::new("TEST"),
        rule: BucketRule::TimeFrame(Duration::from_secs(60)),
        open_time: at(open_secs),
        close_time: at(open_secs + 59),
        high_time: at(open_secs + 20),
        low_time: at(open_secs + 40),
        open: dec(open),
        high: dec(high),
        low: dec(low),
        close: dec(close),
        open_volume: None,
        high_volume: None,
        low_volume: None,
        close_volume: None,
        total_volume: dec(volume),
        buy_volume: None,
        sell_volume: None,
        relative_volume: None,
        total_price: Decimal::ZERO,
        total_ticks: Some(4),
        up_ticks: None,
        down_ticks: None,
        open_interest: None,
        price_levels: None,
        state: CandleState::Finished,
    }
}

#[test]
fn decompose_conserves_volume_and_orders_by_trend() {
    let up = minute_candle(0, "10", "12", "9", "11", "10");
    let parts = decompose(&up);
    assert_eq!(parts.len(), 4);
    let total: Decimal = parts.iter().filter_map(|p| p.volume).sum();
    assert_eq!(total, dec("10"));
    // Up-candle replays open, low, high, close.
    assert_eq!(parts[0].price, dec("10"));
    assert_eq!(parts[1].price, dec("9"));
    assert_eq!(parts[2].price, dec("12"));
    assert_eq!(parts[3].price, dec("11"));

    let down = minute_candle(0, "11", "12", "9", "10", "10");
    let parts = decompose(&down);
    assert_eq!(parts[1].price, dec("12"));
    assert_eq!(parts[2].price, dec("9"));
}

#[test]
fn decompose_of_zero_volume_candle_is_unsized() {
    let parts = decompose(&minute_candle(0, "10", "12", "9", "11", "0"));
    assert!(parts.iter().all(|p| p.volume.is_none()));
}

#[test]
fn three_minutes_compress_into_one_three_minute_candle() {
    let target = CandleBuilder::new(
        Instrument::new("TEST"),
        BucketRule::TimeFrame(Duration::from_secs(180)),
    )
    .unwrap();
    let mut compressor = Compressor::new(target);

    let minutes = [
        minute_candle(0, "10", "11", "9.5", "10.5", "4"),
        minute_candle(60, "10.5", "12", "10", "11.5", "8"),
        minute_candle(120, "11.5", "11.8", "10.8", "11", "4"),
    ];
    for m in &minutes {
        compressor.process_candle(m);
    }
    let big = compressor.finalize().unwrap();

    assert!(big.is_finished());
    assert_eq!(big.open_time, at(0));
    assert_eq!(big.open, dec("10"));
    assert_eq!(big.high, dec("12"));
    assert_eq!(big.low, dec("9.5"));
    assert_eq!(big.close, dec("11"));
    assert_eq!(big.total_volume, dec("16"));
}

#[test]
fn compressor_ignores_active_snapshots() {
    let target = CandleBuilder::new(
        Instrument::new("TEST"),
        BucketRule::TimeFrame(Duration::from_secs(180)),
    )
    .unwrap();
    let mut compressor = Compressor::new(target);

    let mut active = minute_candle(0, "10", "11", "9", "10", "4");
    active.state = CandleState::Active;
    assert!(compressor.process_candle(&active).is_empty());
    assert!(compressor.finalize().is_none());
}

#[test]
fn bucket_boundary_emits_the_closed_target_candle() {
    let target = CandleBuilder::new(
        Instrument::new("TEST"),
        BucketRule::TimeFrame(Duration::from_secs(120)),
    )
    .unwrap();
    let mut compressor = Compressor::new(target);

    compressor.process_candle(&minute_candle(0, "10", "11", "9", "10.5", "4"));
    compressor.process_candle(&minute_candle(60, "10.5", "11.5", "10", "11", "4"));
    // First minute of the next two-minute bucket closes the previous one.
    let out = compressor.process_candle(&minute_candle(120, "11", "12", "10.5", "11.5", "4"));
    let closed: Vec<_> = out.iter().filter(|c| c.is_finished()).collect();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].open_time, at(0));
    assert_eq!(closed[0].total_volume, dec("8"));
}

#[test]
fn trades_hit_the_four_channel_prices() {
    let candle = minute_candle(0, "10", "12", "9", "11", "10");
    let trades = candle_to_trades(&candle, Decimal::ONE);
    assert_eq!(trades.len(), 4);
    let total: Decimal = trades.iter().filter_map(|t| t.volume).sum();
    assert_eq!(total, dec("10"));
    // quarter = floor(10 / 4) = 2, close takes the remaining 4
    assert_eq!(trades[0].volume, Some(dec("2")));
    assert_eq!(trades[3].volume, Some(dec("4")));
    // Up candle: low before high, open/close print as buys.
    assert_eq!(trades[0].side, Some(Side::Buy));
    assert_eq!(trades[1].price, dec("9"));
    assert_eq!(trades[1].side, Some(Side::Sell));
    assert_eq!(trades[2].price, dec("12"));
    assert_eq!(trades[2].side, Some(Side::Buy));
    assert_eq!(trades[3].side, Some(Side::Buy));
}

#[test]
fn tiny_candles_degrade_to_fewer_trades() {
    let base = |v: &str| minute_candle(0, "10", "12", "9", "11", v);

    let zero = candle_to_trades(&base("0"), Decimal::ONE);
    assert_eq!(zero.len(), 1);
    assert_eq!(zero[0].price, dec("10"));

    let one = candle_to_trades(&base("1"), Decimal::ONE);
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].volume, Some(Decimal::ONE));

    let two = candle_to_trades(&base("2"), Decimal::ONE);
    assert_eq!(two.len(), 2);
    assert_eq!(two[0].price, dec("12"));
    assert_eq!(two[1].price, dec("9"));

    let three = candle_to_trades(&base("3"), Decimal::ONE);
    assert_eq!(three.len(), 3);
    assert_eq!(three[0].price, dec("10"));
}

#[test]
fn flat_candle_is_a_single_print() {
    let flat = minute_candle(0, "10", "10", "10", "10", "50");
    let trades = candle_to_trades(&flat, Decimal::ONE);
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].volume, Some(dec("50")));
}

#[test]
fn volume_step_floors_the_quarters() {
    let candle = minute_candle(0, "10", "12", "9", "11", "100");
    let trades = candle_to_trades(&candle, dec("10"));
    // quarter = floor(25 / 10) * 10 = 20, close takes 40
    assert_eq!(trades[0].volume, Some(dec("20")));
    assert_eq!(trades[3].volume, Some(dec("40")));
}
