//! Recompression of finished candles into larger buckets.
//!
//! A finished candle is decomposed into its four logical channels (open,
//! high, low, close at their recorded times, in trend order) and fed through
//! a regular [`CandleBuilder`], so the bigger candle's extremes come from
//! the right sub-events and total volume is conserved exactly.

use rust_decimal::Decimal;

use super::builder::CandleBuilder;
use crate::types::Candle;
use crate::value::BuilderValue;

/// Split a candle into the four channel values, in trend order: an
/// up-candle replays open, low, high, close; anything else replays open,
/// high, low, close. Volume splits into quarters with the remainder on the
/// close so the parts always sum to `total_volume`.
#[must_use]
pub fn decompose(candle: &Candle) -> Vec<BuilderValue> {
    let quarter = (candle.total_volume / Decimal::from(4)).round_dp(8);
    let closing = candle.total_volume - quarter * Decimal::from(3);
    let sized = !candle.total_volume.is_zero();
    let part = |price, time, vol: Decimal| BuilderValue {
        time,
        price,
        volume: sized.then_some(vol),
        side: None,
        open_interest: candle.open_interest,
    };

    let o = part(candle.open, candle.open_time, quarter);
    let h = part(candle.high, candle.high_time, quarter);
    let l = part(candle.low, candle.low_time, quarter);
    let c = part(candle.close, candle.close_time, closing);
    if candle.close > candle.open {
        vec![o, l, h, c]
    } else {
        vec![o, h, l, c]
    }
}

/// Builds a coarser series out of finished candles of a finer one.
#[derive(Debug)]
pub struct Compressor {
    builder: CandleBuilder,
}

impl Compressor {
    /// Wrap a builder configured with the target rule.
    #[must_use]
    pub const fn new(builder: CandleBuilder) -> Self {
        Self { builder }
    }

    /// Fold one finished source candle into the target series. Non-finished
    /// snapshots are ignored.
    pub fn process_candle(&mut self, candle: &Candle) -> Vec<Candle> {
        if !candle.is_finished() {
            return Vec::new();
        }
        decompose(candle)
            .iter()
            .flat_map(|v| self.builder.process(v))
            .collect()
    }

    /// Close the open target bucket at stream end, if any.
    pub fn finalize(&mut self) -> Option<Candle> {
        self.builder.finalize()
    }
}
