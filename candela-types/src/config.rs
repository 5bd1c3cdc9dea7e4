//! Configuration for the candle engine and its built-in sources.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the basket synthesizer reacts to arithmetic failures.
///
/// A closed two-state flag; downstream crates match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArithmeticPolicy {
    /// Surface the failure as a series error.
    #[default]
    Propagate,
    /// Log the failure and skip the affected bucket.
    SkipBucket,
}

/// Global configuration for the `CandleEngine`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retention window per series. Finished candles older than the latest
    /// open time minus this duration become eligible for eviction; the sweep
    /// itself only runs once the excess exceeds half the window again.
    /// `Duration::ZERO` disables eviction entirely.
    pub keep_duration: Duration,
    /// Basket leniency: whether arithmetic failures kill the series or only
    /// drop the affected bucket.
    pub arithmetic_policy: ArithmeticPolicy,
    /// Capacity of per-series event channels.
    pub channel_capacity: usize,
    /// Candles replayed per storage-source cycle and per series before the
    /// worker yields and re-checks its command queue.
    pub storage_batch: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            keep_duration: Duration::from_secs(2 * 24 * 60 * 60),
            arithmetic_policy: ArithmeticPolicy::default(),
            channel_capacity: 256,
            storage_batch: 100,
        }
    }
}
