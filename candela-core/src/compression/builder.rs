use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::profile;
use crate::types::{BucketRule, Candle, CandelaError, CandleState, Instrument, PriceLevel, Side};
use crate::value::BuilderValue;

/// Incremental candle builder for one series.
///
/// Feed raw values in event order via [`process`](Self::process); each call
/// returns the snapshots to publish (at most one `Finished` close of the
/// previous bucket followed by the `Active` state of the current one; Renko
/// gaps may close several bricks at once). The builder owns the only mutable
/// draft; everything it returns is an immutable snapshot.
#[derive(Debug)]
pub struct CandleBuilder {
    instrument: Instrument,
    rule: BucketRule,
    track_profile: bool,
    draft: Option<Draft>,
    // Point-and-figure column direction; meaningless for other rules.
    pnf_up: bool,
}

impl CandleBuilder {
    /// Create a builder, validating the rule parameter.
    ///
    /// # Errors
    /// Returns `InvalidArg` for zero/negative parameters or a time frame
    /// that cannot be represented in microseconds.
    pub fn new(instrument: Instrument, rule: BucketRule) -> Result<Self, CandelaError> {
        match rule {
            BucketRule::TimeFrame(tf) => {
                if tf.is_zero() || i64::try_from(tf.as_micros()).is_err() {
                    return Err(CandelaError::invalid_arg(format!(
                        "unusable time frame: {tf:?}"
                    )));
                }
            }
            BucketRule::TickCount(0) => {
                return Err(CandelaError::invalid_arg("tick count must be positive"));
            }
            BucketRule::Volume(v) if v <= Decimal::ZERO => {
                return Err(CandelaError::invalid_arg("volume threshold must be positive"));
            }
            BucketRule::PriceRange(d) if d <= Decimal::ZERO => {
                return Err(CandelaError::invalid_arg("price range must be positive"));
            }
            BucketRule::Renko(b) if b <= Decimal::ZERO => {
                return Err(CandelaError::invalid_arg("box size must be positive"));
            }
            BucketRule::PointAndFigure { box_size, reversal } => {
                if box_size <= Decimal::ZERO || reversal == 0 {
                    return Err(CandelaError::invalid_arg(
                        "box size and reversal must be positive",
                    ));
                }
            }
            _ => {}
        }
        Ok(Self {
            instrument,
            rule,
            track_profile: false,
            draft: None,
            pnf_up: true,
        })
    }

    /// Enable per-price volume ladder tracking on emitted candles.
    #[must_use]
    pub const fn with_profile(mut self, yes: bool) -> Self {
        self.track_profile = yes;
        self
    }

    /// The bucketing rule this builder applies.
    #[must_use]
    pub const fn rule(&self) -> BucketRule {
        self.rule
    }

    /// Fold one value into the series and return the snapshots to publish.
    pub fn process(&mut self, value: &BuilderValue) -> Vec<Candle> {
        match self.rule {
            BucketRule::Renko(box_size) => self.process_renko(value, box_size),
            BucketRule::PointAndFigure { box_size, reversal } => {
                self.process_pnf(value, box_size, reversal)
            }
            _ => self.process_plain(value),
        }
    }

    /// Close the open bucket at stream end, if any.
    pub fn finalize(&mut self) -> Option<Candle> {
        self.draft.take().map(Draft::finish)
    }

    /// Drop all state, including rule continuation (Renko base, P&F column).
    pub fn reset(&mut self) {
        self.draft = None;
        self.pnf_up = true;
    }

    /// Snapshot of the currently open bucket, if any.
    #[must_use]
    pub fn active(&self) -> Option<Candle> {
        self.draft.as_ref().map(Draft::snapshot)
    }

    fn process_plain(&mut self, value: &BuilderValue) -> Vec<Candle> {
        if let Some(draft) = self.draft.as_mut()
            && !closes_before(&draft.candle, self.rule, value)
        {
            draft.update(value);
            return vec![draft.snapshot()];
        }
        let mut out = Vec::with_capacity(2);
        if let Some(draft) = self.draft.take() {
            out.push(draft.finish());
        }
        let open_time = match self.rule {
            BucketRule::TimeFrame(tf) => floor_time(value.time, tf),
            _ => value.time,
        };
        let draft = Draft::open(
            &self.instrument,
            self.rule,
            open_time,
            value,
            self.track_profile,
            true,
        );
        out.push(draft.snapshot());
        self.draft = Some(draft);
        out
    }

    fn process_renko(&mut self, value: &BuilderValue, box_size: Decimal) -> Vec<Candle> {
        let mut out = Vec::new();
        if self.draft.is_none() {
            let mut draft = Draft::open(
                &self.instrument,
                self.rule,
                value.time,
                value,
                self.track_profile,
                true,
            );
            draft.rebase(floor_to_box(value.price, box_size));
            out.push(draft.snapshot());
            self.draft = Some(draft);
            return out;
        }
        if let Some(draft) = self.draft.as_mut() {
            draft.update(value);
            out.push(draft.snapshot());
        }
        // A move of one or more whole boxes closes bricks at exact
        // boundaries; gap moves synthesize volumeless intermediate bricks.
        loop {
            let boundary = match self.draft.as_ref() {
                Some(d) if value.price >= d.candle.open + box_size => {
                    Some(d.candle.open + box_size)
                }
                Some(d) if value.price <= d.candle.open - box_size => {
                    Some(d.candle.open - box_size)
                }
                _ => None,
            };
            let Some(boundary) = boundary else { break };
            if let Some(mut done) = self.draft.take() {
                let open = done.candle.open;
                done.candle.close = boundary;
                done.candle.high = open.max(boundary);
                done.candle.low = open.min(boundary);
                done.candle.close_time = value.time;
                out.push(done.finish());
            }
            let mut next = Draft::open(
                &self.instrument,
                self.rule,
                value.time,
                value,
                self.track_profile,
                false,
            );
            next.rebase(boundary);
            out.push(next.snapshot());
            self.draft = Some(next);
        }
        out
    }

    fn process_pnf(&mut self, value: &BuilderValue, box_size: Decimal, reversal: u32) -> Vec<Candle> {
        let rev_height = box_size * Decimal::from(reversal);
        let mut out = Vec::new();
        let Some(current) = self.draft.as_ref() else {
            let mut draft = Draft::open(
                &self.instrument,
                self.rule,
                value.time,
                value,
                self.track_profile,
                true,
            );
            draft.rebase(floor_to_box(value.price, box_size));
            self.pnf_up = true;
            out.push(draft.snapshot());
            self.draft = Some(draft);
            return out;
        };
        let (reversed, new_open) = if self.pnf_up {
            (
                value.price <= current.candle.high - rev_height,
                current.candle.high - box_size,
            )
        } else {
            (
                value.price >= current.candle.low + rev_height,
                current.candle.low + box_size,
            )
        };
        if reversed {
            if let Some(done) = self.draft.take() {
                out.push(done.finish());
            }
            let mut next = Draft::open(
                &self.instrument,
                self.rule,
                value.time,
                value,
                self.track_profile,
                true,
            );
            next.rebase(new_open);
            self.pnf_up = !self.pnf_up;
            out.push(next.snapshot());
            self.draft = Some(next);
        } else if let Some(draft) = self.draft.as_mut() {
            draft.update(value);
            out.push(draft.snapshot());
        }
        out
    }
}

/// Whether the open candle must close before folding in `value`.
///
/// Evaluated against the candle state prior to the new value, matching the
/// convention that threshold rules (ticks/volume/range) emit their close on
/// the value after the threshold is met.
fn closes_before(candle: &Candle, rule: BucketRule, value: &BuilderValue) -> bool {
    match rule {
        BucketRule::TimeFrame(tf) => {
            let step = i64::try_from(tf.as_micros()).unwrap_or(i64::MAX);
            value.time < candle.open_time
                || value.time.timestamp_micros() - candle.open_time.timestamp_micros() >= step
        }
        BucketRule::TickCount(n) => candle.total_ticks.unwrap_or(0) >= n,
        BucketRule::Volume(v) => candle.total_volume >= v,
        BucketRule::PriceRange(d) => candle.low + d <= candle.high,
        // Renko and P&F never reach the plain path.
        _ => false,
    }
}

fn floor_time(t: DateTime<Utc>, tf: Duration) -> DateTime<Utc> {
    let step = i64::try_from(tf.as_micros()).unwrap_or(i64::MAX);
    let bucket = t.timestamp_micros().div_euclid(step) * step;
    DateTime::from_timestamp_micros(bucket).unwrap_or(t)
}

fn floor_to_box(price: Decimal, box_size: Decimal) -> Decimal {
    (price / box_size).floor() * box_size
}

#[derive(Debug)]
struct Draft {
    candle: Candle,
    ladder: Option<BTreeMap<Decimal, PriceLevel>>,
    last_price: Decimal,
}

impl Draft {
    /// Seed a new bucket from its first value. With `counted == false` the
    /// value's size and tick are not attributed (synthesized Renko bricks).
    fn open(
        instrument: &Instrument,
        rule: BucketRule,
        open_time: DateTime<Utc>,
        value: &BuilderValue,
        track_profile: bool,
        counted: bool,
    ) -> Self {
        let vol = if counted { value.volume } else { None };
        let amount = vol.unwrap_or_default();
        let (buy, sell) = match (value.side, vol) {
            (Some(Side::Buy), Some(v)) => (Some(v), Some(Decimal::ZERO)),
            (Some(Side::Sell), Some(v)) => (Some(Decimal::ZERO), Some(v)),
            _ => (None, None),
        };
        let mut ladder = track_profile.then(BTreeMap::new);
        if counted && let Some(map) = ladder.as_mut() {
            profile::bump_level(map, value.price, value.side, vol);
        }
        let candle = Candle {
            instrument: instrument.clone(),
            rule,
            open_time,
            close_time: value.time,
            high_time: value.time,
            low_time: value.time,
            open: value.price,
            high: value.price,
            low: value.price,
            close: value.price,
            open_volume: vol,
            high_volume: vol,
            low_volume: vol,
            close_volume: vol,
            total_volume: amount,
            buy_volume: buy,
            sell_volume: sell,
            relative_volume: buy.zip(sell).map(|(b, s)| b - s),
            total_price: value.price * amount,
            total_ticks: Some(u64::from(counted)),
            up_ticks: None,
            down_ticks: None,
            open_interest: value.open_interest,
            price_levels: None,
            state: CandleState::Active,
        };
        Self {
            candle,
            ladder,
            last_price: value.price,
        }
    }

    /// Move the bucket's base price (Renko brick base, P&F column start),
    /// widening the range to include it.
    fn rebase(&mut self, base: Decimal) {
        self.candle.open = base;
        self.candle.low = self.candle.low.min(base);
        self.candle.high = self.candle.high.max(base);
    }

    fn update(&mut self, value: &BuilderValue) {
        let c = &mut self.candle;
        if value.price > c.high {
            c.high = value.price;
            c.high_time = value.time;
            c.high_volume = value.volume;
        }
        if value.price < c.low {
            c.low = value.price;
            c.low_time = value.time;
            c.low_volume = value.volume;
        }
        c.close = value.price;
        c.close_time = value.time;
        c.close_volume = value.volume;
        if let Some(vol) = value.volume {
            c.total_volume += vol;
            c.total_price += value.price * vol;
            if let Some(side) = value.side {
                match side {
                    Side::Buy => *c.buy_volume.get_or_insert(Decimal::ZERO) += vol,
                    Side::Sell => *c.sell_volume.get_or_insert(Decimal::ZERO) += vol,
                }
                c.relative_volume = Some(
                    c.buy_volume.unwrap_or_default() - c.sell_volume.unwrap_or_default(),
                );
            }
        }
        *c.total_ticks.get_or_insert(0) += 1;
        if value.price > self.last_price {
            *c.up_ticks.get_or_insert(0) += 1;
        } else if value.price < self.last_price {
            *c.down_ticks.get_or_insert(0) += 1;
        }
        if let Some(oi) = value.open_interest {
            c.open_interest = Some(oi);
        }
        if let Some(map) = self.ladder.as_mut() {
            profile::bump_level(map, value.price, value.side, value.volume);
        }
        self.last_price = value.price;
    }

    fn snapshot(&self) -> Candle {
        let mut candle = self.candle.clone();
        if let Some(map) = self.ladder.as_ref() {
            candle.price_levels = Some(profile::snapshot(map));
        }
        candle
    }

    fn finish(self) -> Candle {
        let mut candle = self.snapshot();
        candle.state = CandleState::Finished;
        candle
    }
}
