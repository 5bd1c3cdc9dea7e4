//! Synthetic trade reconstruction from finished candles.

use rust_decimal::Decimal;

use crate::types::{Candle, Side};
use crate::value::BuilderValue;

/// Reconstruct representative trades from a finished candle.
///
/// At most four trades are produced, hitting open, high, low, and close at
/// their recorded times (low before high for up-candles). Each of the first
/// three carries a quarter of the total volume rounded down to
/// `volume_step`; the close carries the rest, so volume is conserved. Tiny
/// candles degrade gracefully:
///
/// - zero total volume, or a flat candle, yields a single trade at the open;
/// - volume 1 yields the open trade only;
/// - volume 2 yields high and low;
/// - volume 3 yields open, high, and low, one unit each.
///
/// The high prints as a buy, the low as a sell, open and close follow the
/// candle direction.
#[must_use]
pub fn candle_to_trades(candle: &Candle, volume_step: Decimal) -> Vec<BuilderValue> {
    let up = candle.close > candle.open;
    let trend = if up { Side::Buy } else { Side::Sell };
    let total = candle.total_volume;
    let flat = candle.open == candle.high && candle.low == candle.close && candle.high == candle.low;

    let part = |price, time, vol, side| BuilderValue {
        time,
        price,
        volume: Some(vol),
        side: Some(side),
        open_interest: candle.open_interest,
    };
    let o = |vol| part(candle.open, candle.open_time, vol, trend);
    let h = |vol| part(candle.high, candle.high_time, vol, Side::Buy);
    let l = |vol| part(candle.low, candle.low_time, vol, Side::Sell);
    let c = |vol| part(candle.close, candle.close_time, vol, trend);

    if total.is_zero() || flat {
        return vec![o(total)];
    }
    if total == Decimal::ONE {
        return vec![o(total)];
    }
    if total == Decimal::TWO {
        return vec![h(Decimal::ONE), l(Decimal::ONE)];
    }
    if total == Decimal::from(3) {
        return vec![o(Decimal::ONE), h(Decimal::ONE), l(Decimal::ONE)];
    }

    let step = if volume_step > Decimal::ZERO {
        volume_step
    } else {
        Decimal::ONE
    };
    let quarter = ((total / Decimal::from(4)) / step).floor() * step;
    let closing = total - quarter * Decimal::from(3);
    if up {
        vec![o(quarter), l(quarter), h(quarter), c(closing)]
    } else {
        vec![o(quarter), h(quarter), l(quarter), c(closing)]
    }
}
