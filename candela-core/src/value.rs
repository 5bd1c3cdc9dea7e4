use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Side;

/// A normalized raw event consumed by the candle builder.
///
/// Trades, quote midpoints, and order-log rows all reduce to this shape
/// before bucketing; fields the upstream feed cannot provide stay `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderValue {
    /// Event time.
    pub time: DateTime<Utc>,
    /// Traded or quoted price.
    pub price: Decimal,
    /// Size of the event, when known.
    pub volume: Option<Decimal>,
    /// Aggressor side, when known.
    pub side: Option<Side>,
    /// Open interest carried by the event, when known.
    pub open_interest: Option<Decimal>,
}

impl BuilderValue {
    /// A sized trade print.
    #[must_use]
    pub const fn trade(time: DateTime<Utc>, price: Decimal, volume: Decimal) -> Self {
        Self {
            time,
            price,
            volume: Some(volume),
            side: None,
            open_interest: None,
        }
    }

    /// An unsized price observation (e.g. a quote midpoint).
    #[must_use]
    pub const fn price_only(time: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            time,
            price,
            volume: None,
            side: None,
            open_interest: None,
        }
    }

    /// Attach the aggressor side.
    #[must_use]
    pub const fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }
}
