//! Deterministic fixture data. Prices follow a small repeating wave so the
//! same inputs always produce the same candles.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use candela_core::BuilderValue;
use candela_types::{BucketRule, Candle, CandleState, Instrument, Side};

const WAVE: [i64; 8] = [0, 3, 5, 4, 2, -1, -3, -2];

fn wave_price(base: i64, step: usize) -> Decimal {
    Decimal::new(base * 100 + WAVE[step % WAVE.len()] * 25, 2)
}

/// `count` finished one-minute candles starting at `start`.
#[must_use]
pub fn minute_candles(instrument: &Instrument, start: DateTime<Utc>, count: usize) -> Vec<Candle> {
    let rule = BucketRule::TimeFrame(std::time::Duration::from_secs(60));
    (0..count)
        .map(|i| {
            let open_time = start + Duration::seconds(60 * i as i64);
            let close_time = open_time + Duration::seconds(59);
            let open = wave_price(100, i);
            let close = wave_price(100, i + 1);
            let high = open.max(close) + Decimal::new(10, 2);
            let low = open.min(close) - Decimal::new(10, 2);
            Candle {
                instrument: instrument.clone(),
                rule,
                open_time,
                close_time,
                high_time: close_time,
                low_time: open_time,
                open,
                high,
                low,
                close,
                open_volume: None,
                high_volume: None,
                low_volume: None,
                close_volume: None,
                total_volume: Decimal::from(40 + (i as i64 % 7) * 5),
                buy_volume: None,
                sell_volume: None,
                relative_volume: None,
                total_price: (open + close) * Decimal::from(20),
                total_ticks: Some(4),
                up_ticks: None,
                down_ticks: None,
                open_interest: None,
                price_levels: None,
                state: CandleState::Finished,
            }
        })
        .collect()
}

/// `count` trades spaced `spacing` apart, starting at `start`.
#[must_use]
pub fn trades(start: DateTime<Utc>, spacing: Duration, count: usize) -> Vec<BuilderValue> {
    (0..count)
        .map(|i| {
            let side = if WAVE[i % WAVE.len()] >= WAVE[(i + 7) % WAVE.len()] {
                Side::Buy
            } else {
                Side::Sell
            };
            BuilderValue::trade(
                start + spacing * i as i32,
                wave_price(100, i),
                Decimal::from(1 + (i as i64 % 3)),
            )
            .with_side(side)
        })
        .collect()
}
