use serde::{Deserialize, Serialize};

use crate::{BucketRule, Instrument, TimeRange};

/// Identity of one candle series: instrument, bucketing rule, and the
/// requested time window.
///
/// Used as the correlation key across the engine, the store, and source
/// events. Two starts with the same key address the same series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    /// Instrument the series tracks.
    pub instrument: Instrument,
    /// Bucketing rule, parameter included.
    pub rule: BucketRule,
    /// Requested window.
    pub window: TimeRange,
}

impl SeriesKey {
    /// Series key over the given window.
    #[must_use]
    pub const fn new(instrument: Instrument, rule: BucketRule, window: TimeRange) -> Self {
        Self {
            instrument,
            rule,
            window,
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} {}", self.instrument, self.rule, self.window)
    }
}
