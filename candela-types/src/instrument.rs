use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CandelaError;

/// A tradable instrument identified by symbol and optional venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Instrument {
    /// Ticker symbol.
    pub symbol: String,
    /// Venue/exchange code, when the symbol alone is ambiguous.
    pub venue: Option<String>,
}

impl Instrument {
    /// Instrument with a bare symbol and no venue.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            venue: None,
        }
    }

    /// Instrument qualified by a venue code.
    pub fn with_venue(symbol: impl Into<String>, venue: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            venue: Some(venue.into()),
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.venue {
            Some(v) => write!(f, "{}@{}", self.symbol, v),
            None => write!(f, "{}", self.symbol),
        }
    }
}

/// One constituent of a basket with its weight in the combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketLeg {
    /// The constituent instrument.
    pub instrument: Instrument,
    /// Weight applied to this leg's prices.
    pub weight: Decimal,
}

/// How basket constituent values are folded into one synthetic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum CombineRule {
    /// `Σ weight_i * value_i`.
    #[default]
    WeightedSum,
    /// `Σ weight_i * value_i / Σ weight_i`.
    WeightedAverage,
}

/// A synthetic instrument whose candles are computed from constituent legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketInstrument {
    /// Symbol under which synthetic candles are published.
    pub symbol: String,
    /// Constituent legs, in slot order.
    pub legs: Vec<BasketLeg>,
    /// Combination rule for price-like fields.
    pub combine: CombineRule,
}

impl BasketInstrument {
    /// Weighted-sum basket over the given legs.
    ///
    /// # Errors
    /// Returns `InvalidArg` when `legs` is empty.
    pub fn new(
        symbol: impl Into<String>,
        legs: Vec<BasketLeg>,
        combine: CombineRule,
    ) -> Result<Self, CandelaError> {
        if legs.is_empty() {
            return Err(CandelaError::invalid_arg("basket requires at least one leg"));
        }
        Ok(Self {
            symbol: symbol.into(),
            legs,
            combine,
        })
    }

    /// The instrument synthetic candles are published under.
    #[must_use]
    pub fn as_instrument(&self) -> Instrument {
        Instrument::new(self.symbol.clone())
    }

    /// Combine one price-like value per leg (aligned with `legs`).
    ///
    /// # Errors
    /// Returns `Arithmetic` when the combination cannot be computed, e.g. a
    /// weighted average over a zero total weight.
    pub fn combine_prices(&self, values: &[Decimal]) -> Result<Decimal, CandelaError> {
        debug_assert_eq!(values.len(), self.legs.len());
        let weighted: Decimal = self
            .legs
            .iter()
            .zip(values)
            .map(|(leg, v)| leg.weight * v)
            .sum();
        match self.combine {
            CombineRule::WeightedSum => Ok(weighted),
            CombineRule::WeightedAverage => {
                let total: Decimal = self.legs.iter().map(|l| l.weight).sum();
                if total.is_zero() {
                    return Err(CandelaError::arithmetic(
                        &self.symbol,
                        "weighted average over zero total weight",
                    ));
                }
                Ok(weighted / total)
            }
        }
    }

    /// Combine one volume-like value per leg. Volumes are always plain sums.
    #[must_use]
    pub fn combine_volumes(&self, values: &[Decimal]) -> Decimal {
        values.iter().copied().sum()
    }
}
