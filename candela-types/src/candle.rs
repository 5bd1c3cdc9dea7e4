use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Instrument;

/// Lifecycle state of a candle snapshot.
///
/// `Finished` is terminal: finished snapshots are never updated, only
/// superseded by candles of later buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CandleState {
    /// The bucket is still open and further updates may arrive.
    #[default]
    Active,
    /// The bucket closed; this snapshot is final.
    Finished,
}

/// Aggressor side of a raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buyer-initiated.
    Buy,
    /// Seller-initiated.
    Sell,
}

/// Bucketing rule deciding when one candle closes and the next opens.
///
/// The parameter is carried inside the variant, so a series key is a single
/// self-describing value rather than a (kind, argument) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum BucketRule {
    /// Fixed wall-clock buckets of the given length, aligned to the UTC epoch.
    TimeFrame(Duration),
    /// Close after the given number of raw values.
    TickCount(u64),
    /// Close once accumulated volume reaches the threshold.
    Volume(Decimal),
    /// Close once `high - low` reaches the given price delta.
    PriceRange(Decimal),
    /// Fixed-size bricks; a new brick opens on each full box move.
    Renko(Decimal),
    /// Point-and-figure columns of `box_size` boxes, reversing after
    /// `reversal` boxes against the column direction.
    PointAndFigure {
        /// Price height of one box.
        box_size: Decimal,
        /// Number of boxes a counter-move must span to start a new column.
        reversal: u32,
    },
}

impl std::fmt::Display for BucketRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimeFrame(tf) => write!(f, "tf:{}s", tf.as_secs()),
            Self::TickCount(n) => write!(f, "ticks:{n}"),
            Self::Volume(v) => write!(f, "vol:{v}"),
            Self::PriceRange(d) => write!(f, "range:{d}"),
            Self::Renko(b) => write!(f, "renko:{b}"),
            Self::PointAndFigure { box_size, reversal } => {
                write!(f, "pnf:{box_size}x{reversal}")
            }
        }
    }
}

/// One rung of a candle's volume profile ladder.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price of this level.
    pub price: Decimal,
    /// Number of buyer-initiated values at this price.
    pub buy_count: u64,
    /// Number of seller-initiated values at this price.
    pub sell_count: u64,
    /// Buyer-initiated volume at this price.
    pub buy_volume: Decimal,
    /// Seller-initiated volume at this price.
    pub sell_volume: Decimal,
    /// Total volume at this price, including values with no side.
    pub total_volume: Decimal,
}

/// An OHLCV candle snapshot.
///
/// Snapshots are emitted by builders and stored/forwarded by value; mutating
/// a copy never affects the series. The `state` field distinguishes interim
/// (`Active`) snapshots of an open bucket from the final (`Finished`) one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Instrument this candle belongs to.
    pub instrument: Instrument,
    /// Bucketing rule that produced the candle.
    pub rule: BucketRule,
    /// Time the bucket opened.
    pub open_time: DateTime<Utc>,
    /// Time of the last value folded into the bucket.
    pub close_time: DateTime<Utc>,
    /// Time the high was set.
    pub high_time: DateTime<Utc>,
    /// Time the low was set.
    pub low_time: DateTime<Utc>,
    /// Opening price.
    pub open: Decimal,
    /// Highest price.
    pub high: Decimal,
    /// Lowest price.
    pub low: Decimal,
    /// Latest price.
    pub close: Decimal,
    /// Volume of the value that opened the bucket.
    pub open_volume: Option<Decimal>,
    /// Volume of the value that set the current high.
    pub high_volume: Option<Decimal>,
    /// Volume of the value that set the current low.
    pub low_volume: Option<Decimal>,
    /// Volume of the most recent value.
    pub close_volume: Option<Decimal>,
    /// Total volume folded into the bucket.
    pub total_volume: Decimal,
    /// Buyer-initiated share of `total_volume`, when sides are known.
    pub buy_volume: Option<Decimal>,
    /// Seller-initiated share of `total_volume`, when sides are known.
    pub sell_volume: Option<Decimal>,
    /// `buy_volume - sell_volume`, when sides are known.
    pub relative_volume: Option<Decimal>,
    /// Sum of `price * volume` over the bucket, for VWAP.
    pub total_price: Decimal,
    /// Number of values folded into the bucket.
    pub total_ticks: Option<u64>,
    /// Values that printed above the previous price.
    pub up_ticks: Option<u64>,
    /// Values that printed below the previous price.
    pub down_ticks: Option<u64>,
    /// Open interest carried by the latest value, when known.
    pub open_interest: Option<Decimal>,
    /// Per-price volume ladder, when profile tracking is enabled.
    pub price_levels: Option<Vec<PriceLevel>>,
    /// Lifecycle state of this snapshot.
    pub state: CandleState,
}

impl Candle {
    /// Full height of the candle (`high - low`).
    #[must_use]
    pub fn length(&self) -> Decimal {
        self.high - self.low
    }

    /// Height of the body (`|open - close|`).
    #[must_use]
    pub fn body(&self) -> Decimal {
        (self.open - self.close).abs()
    }

    /// Upper shadow: distance from the top of the body to the high.
    #[must_use]
    pub fn top_shadow(&self) -> Decimal {
        self.high - self.open.max(self.close)
    }

    /// Lower shadow: distance from the bottom of the body to the low.
    #[must_use]
    pub fn bottom_shadow(&self) -> Decimal {
        self.open.min(self.close) - self.low
    }

    /// Midpoint of the candle range.
    #[must_use]
    pub fn mid_price(&self) -> Decimal {
        self.low + self.length() / Decimal::TWO
    }

    /// Whether the candle closed at or above its open.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }

    /// Volume-weighted average price, `None` when no volume was recorded.
    #[must_use]
    pub fn vwap(&self) -> Option<Decimal> {
        if self.total_volume.is_zero() {
            None
        } else {
            Some(self.total_price / self.total_volume)
        }
    }

    /// Whether this snapshot is final.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self.state, CandleState::Finished)
    }
}
