//! Per-price volume ladder maintenance and aggregates.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::types::{PriceLevel, Side};

/// Fold one value into the ladder at its price.
pub(crate) fn bump_level(
    ladder: &mut BTreeMap<Decimal, PriceLevel>,
    price: Decimal,
    side: Option<Side>,
    volume: Option<Decimal>,
) {
    let level = ladder.entry(price).or_insert_with(|| PriceLevel {
        price,
        ..PriceLevel::default()
    });
    let vol = volume.unwrap_or_default();
    level.total_volume += vol;
    match side {
        Some(Side::Buy) => {
            level.buy_count += 1;
            level.buy_volume += vol;
        }
        Some(Side::Sell) => {
            level.sell_count += 1;
            level.sell_volume += vol;
        }
        None => {}
    }
}

/// Snapshot the ladder as a price-sorted vector.
pub(crate) fn snapshot(ladder: &BTreeMap<Decimal, PriceLevel>) -> Vec<PriceLevel> {
    ladder.values().cloned().collect()
}

/// Point of control: the level carrying the most volume. Ties resolve to
/// the lowest price.
#[must_use]
pub fn poc(levels: &[PriceLevel]) -> Option<&PriceLevel> {
    levels.iter().max_by(|a, b| {
        a.total_volume
            .cmp(&b.total_volume)
            .then(b.price.cmp(&a.price))
    })
}
