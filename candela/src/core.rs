use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use candela_core::handle::TaskHandle;
use candela_core::{
    CandleEvent, CandleSource, CandleStore, HistoryStore, SourceCoverage, plan_coverage,
};
use candela_types::{
    BasketInstrument, BucketRule, Candle, CandelaError, EngineConfig, SeriesKey, TimeRange,
    join_ranges,
};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::engine::storage::StorageCandleSource;
use crate::engine::{basket, chain};

/// Orchestrator that drives candle series across registered sources.
pub struct CandleEngine {
    pub(crate) inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    pub(crate) sources: Vec<Arc<dyn CandleSource>>,
    pub(crate) store: Arc<CandleStore>,
    pub(crate) cfg: EngineConfig,
    pub(crate) active: Mutex<HashMap<SeriesKey, ActiveSeries>>,
    generations: AtomicU64,
}

/// Registry entry for a running series.
///
/// The entry outlives a `stop` call: it is removed only by the driver task
/// itself, right after the series' `Stopped` event went out. While the
/// series winds down the handle is already taken, but the key stays claimed
/// so a restart is rejected until the old driver is fully gone.
pub(crate) struct ActiveSeries {
    generation: u64,
    handle: Option<TaskHandle>,
}

impl EngineInner {
    pub(crate) fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a driver under `series`. The caller holds the registry lock
    /// and has already checked for duplicates.
    pub(crate) fn register(
        active: &mut HashMap<SeriesKey, ActiveSeries>,
        series: SeriesKey,
        generation: u64,
        handle: TaskHandle,
    ) {
        active.insert(
            series,
            ActiveSeries {
                generation,
                handle: Some(handle),
            },
        );
    }

    /// Drop the registry entry for `series`, but only if it still belongs to
    /// the driver identified by `generation`.
    ///
    /// Called by the driver task itself as its last step, so a leftover
    /// handle is detached rather than dropped: the drop guard must not abort
    /// the caller.
    pub(crate) async fn deregister(&self, series: &SeriesKey, generation: u64) {
        let mut active = self.active.lock().await;
        if active
            .get(series)
            .is_some_and(|entry| entry.generation == generation)
            && let Some(mut entry) = active.remove(series)
            && let Some(handle) = entry.handle.take()
        {
            handle.detach();
        }
    }
}

/// Per-series event channel handed back by [`CandleEngine::start`].
///
/// Yields `Candle` and `Error` events and ends with exactly one `Stopped`.
#[derive(Debug)]
pub struct SeriesSubscription {
    pub(crate) series: SeriesKey,
    pub(crate) receiver: mpsc::Receiver<CandleEvent>,
}

impl SeriesSubscription {
    /// The series this subscription follows.
    #[must_use]
    pub const fn series(&self) -> &SeriesKey {
        &self.series
    }

    /// Receive the next event; `None` after `Stopped` has been consumed and
    /// the channel drained.
    pub async fn recv(&mut self) -> Option<CandleEvent> {
        self.receiver.recv().await
    }
}

/// Tag an error with the source it came from, unless already tagged.
pub(crate) fn tag_err(source: &'static str, e: CandelaError) -> CandelaError {
    match e {
        CandelaError::Source { .. } => e,
        other => CandelaError::source(source, other.to_string()),
    }
}

/// Stop a series and wait for its driver task to wind down. The registry
/// entry stays in place until the driver's `Stopped` has fired; only the
/// handle is taken, so a second stop during wind-down is a no-op. No-op
/// when the series is not active.
pub(crate) async fn stop_series(inner: &Arc<EngineInner>, series: &SeriesKey) {
    let handle = {
        let mut active = inner.active.lock().await;
        match active.get_mut(series) {
            Some(entry) => entry.handle.take(),
            None => return,
        }
    };
    if let Some(handle) = handle {
        handle.stop().await;
    }
}

/// Register and spawn the chain driver for one series.
pub(crate) async fn start_series(
    inner: &Arc<EngineInner>,
    series: SeriesKey,
) -> Result<SeriesSubscription, CandelaError> {
    let mut active = inner.active.lock().await;
    if active.contains_key(&series) {
        return Err(CandelaError::duplicate_series(series.to_string()));
    }

    let coverage: Vec<SourceCoverage> = inner
        .sources
        .iter()
        .map(|s| SourceCoverage {
            priority: s.speed_priority(),
            ranges: s.supported_ranges(&series),
        })
        .collect();
    let claims = plan_coverage(series.window, &coverage);

    inner.store.start(&series);

    let generation = inner.next_generation();
    let (event_tx, event_rx) = mpsc::channel(inner.cfg.channel_capacity);
    let (stop_tx, stop_rx) = oneshot::channel();
    let join = chain::spawn_chain(
        chain::ChainParams {
            series: series.clone(),
            claims,
            generation,
            inner: Arc::clone(inner),
            downstream: event_tx,
        },
        stop_rx,
    );
    // Registered before any event can be delivered, so stop() always finds
    // the entry.
    EngineInner::register(
        &mut active,
        series.clone(),
        generation,
        TaskHandle::new(join, stop_tx),
    );
    drop(active);

    Ok(SeriesSubscription {
        series,
        receiver: event_rx,
    })
}

impl CandleEngine {
    /// Start building an engine.
    #[must_use]
    pub fn builder() -> CandleEngineBuilder {
        CandleEngineBuilder::new()
    }

    /// Start a candle series over the window carried by its key.
    ///
    /// Plans coverage across the registered sources, registers the series,
    /// resets its store entry, and spawns the chain driver. Candles are
    /// stored as they arrive and forwarded on the returned subscription.
    ///
    /// # Errors
    /// `DuplicateSeries` when the series is already active.
    pub async fn start(&self, series: SeriesKey) -> Result<SeriesSubscription, CandelaError> {
        start_series(&self.inner, series).await
    }

    /// Start a synthetic basket series over `window`.
    ///
    /// Every leg series is started on this engine; finished leg candles are
    /// folded through the basket synthesizer and published under the
    /// basket's own key. Stopping the basket stops the legs, and the
    /// basket's `Stopped` fires after all legs complete.
    ///
    /// # Errors
    /// `DuplicateSeries` when the basket or any leg series is already
    /// active; leg start failures unwind the legs already started.
    pub async fn start_basket(
        &self,
        basket_instrument: BasketInstrument,
        rule: BucketRule,
        window: TimeRange,
    ) -> Result<SeriesSubscription, CandelaError> {
        basket::start_basket(&self.inner, basket_instrument, rule, window).await
    }

    /// Stop a series. Idempotent; unknown series are ignored. The series'
    /// subscription receives its final `Stopped` event before this returns.
    pub async fn stop(&self, series: &SeriesKey) {
        stop_series(&self.inner, series).await;
    }

    /// Whether the series is currently active.
    pub async fn is_active(&self, series: &SeriesKey) -> bool {
        self.inner.active.lock().await.contains_key(series)
    }

    /// Union of the ranges any registered source can serve for `series`.
    #[must_use]
    pub fn supported_ranges(&self, series: &SeriesKey) -> Vec<TimeRange> {
        join_ranges(
            self.inner
                .sources
                .iter()
                .flat_map(|s| s.supported_ranges(series))
                .collect(),
        )
    }

    /// The shared candle store.
    #[must_use]
    pub fn store(&self) -> Arc<CandleStore> {
        Arc::clone(&self.inner.store)
    }

    /// Candles whose bucket opened exactly at `time`.
    #[must_use]
    pub fn candles_at(&self, series: &SeriesKey, time: DateTime<Utc>) -> Vec<Candle> {
        self.inner.store.candles_at(series, time)
    }

    /// Candles whose open time falls inside `range`, oldest first.
    #[must_use]
    pub fn candles_in(&self, series: &SeriesKey, range: TimeRange) -> Vec<Candle> {
        self.inner.store.candles_in(series, range)
    }

    /// The most recent `n` candles, oldest first.
    #[must_use]
    pub fn last_n(&self, series: &SeriesKey, n: usize) -> Vec<Candle> {
        self.inner.store.last_n(series, n)
    }

    /// The candle `idx` positions from the end (`0` is the latest).
    #[must_use]
    pub fn candle_from_end(&self, series: &SeriesKey, idx: usize) -> Option<Candle> {
        self.inner.store.candle_from_end(series, idx)
    }

    /// Number of retained candles for `series`.
    #[must_use]
    pub fn candle_count(&self, series: &SeriesKey) -> usize {
        self.inner.store.candle_count(series)
    }
}

/// Builder for constructing a `CandleEngine` with custom configuration.
pub struct CandleEngineBuilder {
    sources: Vec<Arc<dyn CandleSource>>,
    histories: Vec<Arc<dyn HistoryStore>>,
    cfg: EngineConfig,
}

impl Default for CandleEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CandleEngineBuilder {
    /// Create a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: vec![],
            histories: vec![],
            cfg: EngineConfig::default(),
        }
    }

    /// Register a candle source. Registration order breaks priority ties.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn CandleSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Register a history store, served through a storage replay source
    /// using the configured `storage_batch`. History-backed sources are
    /// appended after the explicitly registered ones.
    #[must_use]
    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.histories.push(history);
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, cfg: EngineConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Set the retention keep-window. `Duration::ZERO` disables eviction.
    #[must_use]
    pub const fn keep_duration(mut self, keep: std::time::Duration) -> Self {
        self.cfg.keep_duration = keep;
        self
    }

    /// Set the basket arithmetic leniency policy.
    #[must_use]
    pub const fn arithmetic_policy(mut self, policy: candela_types::ArithmeticPolicy) -> Self {
        self.cfg.arithmetic_policy = policy;
        self
    }

    /// Set the per-series event channel capacity.
    #[must_use]
    pub const fn channel_capacity(mut self, capacity: usize) -> Self {
        self.cfg.channel_capacity = capacity;
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    /// `InvalidArg` when the configuration is unusable (zero channel
    /// capacity or storage batch).
    pub fn build(self) -> Result<CandleEngine, CandelaError> {
        if self.cfg.channel_capacity == 0 {
            return Err(CandelaError::invalid_arg("channel capacity must be positive"));
        }
        if self.cfg.storage_batch == 0 {
            return Err(CandelaError::invalid_arg("storage batch must be positive"));
        }
        let mut sources = self.sources;
        for history in self.histories {
            sources.push(Arc::new(StorageCandleSource::new(
                history,
                self.cfg.storage_batch,
            )));
        }
        let store = Arc::new(CandleStore::new(self.cfg.keep_duration));
        Ok(CandleEngine {
            inner: Arc::new(EngineInner {
                sources,
                store,
                cfg: self.cfg,
                active: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
        })
    }
}
