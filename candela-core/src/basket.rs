//! Synthetic index candles combined from constituent series.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::{
    ArithmeticPolicy, BasketInstrument, BucketRule, Candle, CandelaError, CandleState, Instrument,
    SeriesKey, TimeRange,
};

/// Combines finished constituent candles into synthetic basket candles.
///
/// Candles are bucketed by open time into per-bucket slot buffers, one slot
/// per leg. A bucket emits once every slot is filled. Legs rarely tick in
/// lockstep, so up to two staging buckets may stay open at once; when a
/// newer bucket completes first (or a third bucket opens), older incomplete
/// buckets are forward-filled from the last fully known bucket: a missing
/// slot becomes a zero-volume candle pinned at the leg's previous close.
/// Buckets always emit oldest first. A bucket that cannot be filled because
/// no prior state exists is fatal (`UnresolvableBucket`).
#[derive(Debug)]
pub struct BasketCandleBuilder {
    basket: BasketInstrument,
    rule: BucketRule,
    policy: ArithmeticPolicy,
    slots: HashMap<Instrument, usize>,
    buffers: BTreeMap<DateTime<Utc>, Buffer>,
    last_complete: Option<Vec<Candle>>,
    max_pending: usize,
}

#[derive(Debug)]
struct Buffer {
    slots: Vec<Option<Candle>>,
}

impl Buffer {
    fn new(n: usize) -> Self {
        Self {
            slots: vec![None; n],
        }
    }

    fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    fn fill_from(&mut self, prev: &[Candle], open_time: DateTime<Utc>, rule: BucketRule) {
        for (slot, source) in self.slots.iter_mut().zip(prev) {
            if slot.is_none() {
                *slot = Some(filler(source, open_time, rule));
            }
        }
    }
}

/// Zero-volume stand-in pinned at the leg's previous close.
fn filler(prev: &Candle, open_time: DateTime<Utc>, rule: BucketRule) -> Candle {
    Candle {
        instrument: prev.instrument.clone(),
        rule,
        open_time,
        close_time: open_time,
        high_time: open_time,
        low_time: open_time,
        open: prev.close,
        high: prev.close,
        low: prev.close,
        close: prev.close,
        open_volume: None,
        high_volume: None,
        low_volume: None,
        close_volume: None,
        total_volume: Decimal::ZERO,
        buy_volume: None,
        sell_volume: None,
        relative_volume: None,
        total_price: Decimal::ZERO,
        total_ticks: None,
        up_ticks: None,
        down_ticks: None,
        open_interest: None,
        price_levels: None,
        state: CandleState::Finished,
    }
}

impl BasketCandleBuilder {
    /// Builder for the given basket under one bucketing rule.
    #[must_use]
    pub fn new(basket: BasketInstrument, rule: BucketRule, policy: ArithmeticPolicy) -> Self {
        let slots = basket
            .legs
            .iter()
            .enumerate()
            .map(|(i, leg)| (leg.instrument.clone(), i))
            .collect();
        Self {
            basket,
            rule,
            policy,
            slots,
            buffers: BTreeMap::new(),
            last_complete: None,
            max_pending: 2,
        }
    }

    /// The leg series keys this builder expects input from, over `window`.
    #[must_use]
    pub fn leg_series(&self, leg_rule: BucketRule, window: TimeRange) -> Vec<SeriesKey> {
        self.basket
            .legs
            .iter()
            .map(|leg| SeriesKey::new(leg.instrument.clone(), leg_rule, window))
            .collect()
    }

    /// Fold one constituent candle in, returning synthetic candles ready to
    /// publish (oldest first). Active snapshots and foreign instruments are
    /// ignored.
    ///
    /// # Errors
    /// `UnresolvableBucket` when an incomplete bucket must resolve and no
    /// prior bucket exists to fill from; `Arithmetic` under
    /// [`ArithmeticPolicy::Propagate`] when a combination fails; `Data` when
    /// a leg delivers two different candles for the same bucket.
    pub fn process_candle(&mut self, candle: &Candle) -> Result<Vec<Candle>, CandelaError> {
        if !candle.is_finished() {
            return Ok(Vec::new());
        }
        let Some(&slot) = self.slots.get(&candle.instrument) else {
            return Ok(Vec::new());
        };
        let legs = self.basket.legs.len();
        let buffer = self
            .buffers
            .entry(candle.open_time)
            .or_insert_with(|| Buffer::new(legs));
        match &buffer.slots[slot] {
            Some(existing) if existing == candle => return Ok(Vec::new()),
            Some(_) => {
                return Err(CandelaError::data(format!(
                    "{} delivered conflicting candles for bucket {}",
                    candle.instrument, candle.open_time
                )));
            }
            None => buffer.slots[slot] = Some(candle.clone()),
        }
        self.drain_ready()
    }

    /// Drop all staged buckets and fill state.
    pub fn reset(&mut self) {
        self.buffers.clear();
        self.last_complete = None;
    }

    fn drain_ready(&mut self) -> Result<Vec<Candle>, CandelaError> {
        let mut out = Vec::new();
        loop {
            let Some((&first_time, first_buf)) = self.buffers.first_key_value() else {
                break;
            };
            if first_buf.is_complete() {
                let Some((_, buf)) = self.buffers.pop_first() else {
                    break;
                };
                let slots: Vec<Candle> = buf.slots.into_iter().flatten().collect();
                match self.combine(first_time, &slots) {
                    Ok(candle) => out.push(candle),
                    Err(err @ CandelaError::Arithmetic { .. }) => match self.policy {
                        ArithmeticPolicy::Propagate => return Err(err),
                        ArithmeticPolicy::SkipBucket => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(
                                basket = %self.basket.symbol,
                                bucket = %first_time,
                                error = %err,
                                "skipping unresolvable combination"
                            );
                            #[cfg(not(feature = "tracing"))]
                            let _ = err;
                        }
                    },
                    Err(err) => return Err(err),
                }
                self.last_complete = Some(slots);
                continue;
            }
            // An older bucket must resolve once a newer one is done, or once
            // the staging depth is exceeded.
            let newer_complete = self.buffers.values().skip(1).any(Buffer::is_complete);
            if newer_complete || self.buffers.len() > self.max_pending {
                let Some(prev) = self.last_complete.clone() else {
                    return Err(CandelaError::UnresolvableBucket {
                        series: self.basket.symbol.clone(),
                        open_time: first_time,
                    });
                };
                if let Some(buf) = self.buffers.get_mut(&first_time) {
                    buf.fill_from(&prev, first_time, self.rule);
                }
                continue;
            }
            break;
        }
        Ok(out)
    }

    fn combine(
        &self,
        open_time: DateTime<Utc>,
        slots: &[Candle],
    ) -> Result<Candle, CandelaError> {
        let prices =
            |f: fn(&Candle) -> Decimal| -> Vec<Decimal> { slots.iter().map(f).collect() };
        let mut open = self.basket.combine_prices(&prices(|c| c.open))?;
        let mut high = self.basket.combine_prices(&prices(|c| c.high))?;
        let mut low = self.basket.combine_prices(&prices(|c| c.low))?;
        let mut close = self.basket.combine_prices(&prices(|c| c.close))?;
        let total_price = self.basket.combine_prices(&prices(|c| c.total_price))?;
        let total_volume = self.basket.combine_volumes(&prices(|c| c.total_volume));

        // Correction pass: degenerate constituent data must still yield a
        // well-formed candle.
        if let Some(fallback) = [open, high, low].into_iter().find(|v| !v.is_zero()) {
            for field in [&mut open, &mut high, &mut low, &mut close] {
                if field.is_zero() {
                    *field = fallback;
                }
            }
        }
        if high < low {
            std::mem::swap(&mut high, &mut low);
        }
        high = high.max(open).max(close);
        low = low.min(open).min(close);

        let close_time = slots
            .iter()
            .map(|c| c.close_time)
            .max()
            .unwrap_or(open_time);
        let total_ticks = slots
            .iter()
            .filter_map(|c| c.total_ticks)
            .fold(None, |acc: Option<u64>, n| Some(acc.unwrap_or(0) + n));

        Ok(Candle {
            instrument: self.basket.as_instrument(),
            rule: self.rule,
            open_time,
            close_time,
            high_time: close_time,
            low_time: close_time,
            open,
            high,
            low,
            close,
            open_volume: None,
            high_volume: None,
            low_volume: None,
            close_volume: None,
            total_volume,
            buy_volume: None,
            sell_volume: None,
            relative_volume: None,
            total_price,
            total_ticks,
            up_ticks: None,
            down_ticks: None,
            open_interest: None,
            price_levels: None,
            state: CandleState::Finished,
        })
    }
}
