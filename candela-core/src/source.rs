use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::{Candle, CandelaError, Instrument, SeriesKey, TimeRange};
use crate::value::BuilderValue;

/// Messages a source (or the engine) emits for one series.
///
/// This is the complete message set: candles as they form, a single
/// `Stopped` when a source (or the whole series) is done, and non-fatal
/// errors that do not end delivery.
#[derive(Debug, Clone)]
pub enum CandleEvent {
    /// A candle snapshot, `Active` or `Finished`.
    Candle {
        /// Series the candle belongs to.
        series: SeriesKey,
        /// The snapshot.
        candle: Candle,
    },
    /// The source finished its claimed range (or was stopped) for the series.
    Stopped {
        /// Series that completed.
        series: SeriesKey,
    },
    /// A non-fatal failure while serving the series.
    Error {
        /// Series the failure belongs to.
        series: SeriesKey,
        /// What went wrong.
        error: CandelaError,
    },
}

/// A provider of candles for some portion of a requested window.
///
/// Sources advertise the sub-ranges they can serve and a speed priority;
/// the coverage planner hands each source disjoint claims out of the
/// request. A started source pushes `CandleEvent`s into the channel it was
/// given and must emit exactly one `Stopped` per started series, whether it
/// exhausts its claim or is stopped early.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Stable source name used in error tagging and logs.
    fn name(&self) -> &'static str;

    /// Relative speed rank; lower claims first. Live builders are fastest
    /// (0), local storage next (1), remote backfills after that.
    fn speed_priority(&self) -> u8;

    /// Sub-ranges of the series window this source can serve. An empty
    /// result opts the source out of the series entirely.
    fn supported_ranges(&self, series: &SeriesKey) -> Vec<TimeRange>;

    /// Begin serving `range` for `series`, emitting into `events`.
    ///
    /// # Errors
    /// Returns an error when the series cannot be started at all; failures
    /// after a successful start are reported as `CandleEvent::Error`.
    async fn start(
        &self,
        series: SeriesKey,
        range: TimeRange,
        events: mpsc::Sender<CandleEvent>,
    ) -> Result<(), CandelaError>;

    /// Request the source to stop serving `series`. Idempotent; unknown
    /// series are ignored.
    async fn stop(&self, series: &SeriesKey);
}

/// Read access to previously built candles, backing the storage source.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load the finished candles of `series` inside `range`, ordered by
    /// open time.
    ///
    /// # Errors
    /// Returns an error when the underlying storage fails; an empty result
    /// is not an error.
    async fn load(&self, series: &SeriesKey, range: TimeRange)
    -> Result<Vec<Candle>, CandelaError>;

    /// Ranges for which stored data exists.
    fn supported_ranges(&self, series: &SeriesKey) -> Vec<TimeRange>;
}

/// A live feed of raw values for an instrument, consumed by the builder
/// source. This is the boundary to whatever transport delivers ticks.
#[async_trait]
pub trait ValueFeed: Send + Sync {
    /// Subscribe to raw values for `instrument`.
    ///
    /// # Errors
    /// Returns an error when the subscription cannot be established.
    async fn subscribe(
        &self,
        instrument: &Instrument,
    ) -> Result<mpsc::Receiver<BuilderValue>, CandelaError>;

    /// Drop the subscription for `instrument`. Idempotent.
    async fn unsubscribe(&self, instrument: &Instrument);
}
