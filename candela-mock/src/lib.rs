//! Deterministic mock sources and feeds for tests and examples.
//!
//! Everything here is scripted up front: a [`MockCandleSource`] replays the
//! candles it was given for the overlap with its claim, a
//! [`MockHistoryStore`] serves preloaded history, and a [`MockValueFeed`]
//! streams a fixed tape of raw values. The symbol `FAIL` forces failures so
//! error paths can be exercised without flaky setups.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use candela_core::{BuilderValue, CandleEvent, CandleSource, HistoryStore, ValueFeed};
use candela_types::{Candle, CandelaError, Instrument, SeriesKey, TimeRange};
use tokio::sync::{mpsc, oneshot};

pub mod fixtures;

const FAIL_SYMBOL: &str = "FAIL";

enum StopGate {
    Waiting(oneshot::Sender<()>),
    Released,
}

/// Scripted candle source replaying fixed candles for its advertised ranges.
pub struct MockCandleSource {
    name: &'static str,
    priority: u8,
    ranges: HashMap<SeriesKey, Vec<TimeRange>>,
    candles: HashMap<SeriesKey, Vec<Candle>>,
    stopped: Mutex<Vec<SeriesKey>>,
    manual_stop: bool,
    gates: Mutex<HashMap<SeriesKey, StopGate>>,
}

impl MockCandleSource {
    #[must_use]
    pub fn new(name: &'static str, priority: u8) -> Self {
        Self {
            name,
            priority,
            ranges: HashMap::new(),
            candles: HashMap::new(),
            stopped: Mutex::new(Vec::new()),
            manual_stop: false,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Withhold each series' `Stopped` confirmation until [`release`] is
    /// called for it; `stop` still only records the call. Lets tests hold a
    /// series in wind-down indefinitely.
    ///
    /// [`release`]: MockCandleSource::release
    #[must_use]
    pub const fn manual_stop(mut self) -> Self {
        self.manual_stop = true;
        self
    }

    /// Let a gated series confirm with `Stopped`. Safe to call before the
    /// series starts; the confirmation then goes out immediately on start.
    pub fn release(&self, series: &SeriesKey) {
        if let Ok(mut gates) = self.gates.lock() {
            match gates.remove(series) {
                Some(StopGate::Waiting(tx)) => {
                    let _ = tx.send(());
                }
                _ => {
                    gates.insert(series.clone(), StopGate::Released);
                }
            }
        }
    }

    /// Script a series: the ranges to advertise and the candles to replay.
    #[must_use]
    pub fn with_series(
        mut self,
        series: SeriesKey,
        ranges: Vec<TimeRange>,
        candles: Vec<Candle>,
    ) -> Self {
        self.ranges.insert(series.clone(), ranges);
        self.candles.insert(series, candles);
        self
    }

    /// Series for which `stop` was called, in call order.
    #[must_use]
    pub fn stop_calls(&self) -> Vec<SeriesKey> {
        self.stopped.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CandleSource for MockCandleSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn speed_priority(&self) -> u8 {
        self.priority
    }

    fn supported_ranges(&self, series: &SeriesKey) -> Vec<TimeRange> {
        self.ranges.get(series).cloned().unwrap_or_default()
    }

    async fn start(
        &self,
        series: SeriesKey,
        range: TimeRange,
        events: mpsc::Sender<CandleEvent>,
    ) -> Result<(), CandelaError> {
        if series.instrument.symbol == FAIL_SYMBOL {
            return Err(CandelaError::source(
                self.name,
                format!("forced failure for {series}"),
            ));
        }
        let scripted: Vec<Candle> = self
            .candles
            .get(&series)
            .map(|all| {
                all.iter()
                    .filter(|c| range.contains(c.open_time))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let mut gate = None;
        if self.manual_stop
            && let Ok(mut gates) = self.gates.lock()
        {
            match gates.remove(&series) {
                Some(StopGate::Released) => {}
                _ => {
                    let (tx, rx) = oneshot::channel();
                    gates.insert(series.clone(), StopGate::Waiting(tx));
                    gate = Some(rx);
                }
            }
        }
        tokio::spawn(async move {
            for candle in scripted {
                let ev = CandleEvent::Candle {
                    series: series.clone(),
                    candle,
                };
                if events.send(ev).await.is_err() {
                    break;
                }
            }
            if let Some(rx) = gate {
                let _ = rx.await;
            }
            let _ = events.send(CandleEvent::Stopped { series }).await;
        });
        Ok(())
    }

    async fn stop(&self, series: &SeriesKey) {
        if let Ok(mut stopped) = self.stopped.lock() {
            stopped.push(series.clone());
        }
    }
}

/// Preloaded history store for driving the storage replay source.
#[derive(Default)]
pub struct MockHistoryStore {
    data: HashMap<SeriesKey, Vec<Candle>>,
}

impl MockHistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload candles for a series. Kept sorted by open time.
    #[must_use]
    pub fn with_candles(mut self, series: SeriesKey, mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.open_time);
        self.data.insert(series, candles);
        self
    }
}

#[async_trait]
impl HistoryStore for MockHistoryStore {
    async fn load(
        &self,
        series: &SeriesKey,
        range: TimeRange,
    ) -> Result<Vec<Candle>, CandelaError> {
        if series.instrument.symbol == FAIL_SYMBOL {
            return Err(CandelaError::source("mock-history", "forced load failure"));
        }
        Ok(self
            .data
            .get(series)
            .map(|all| {
                all.iter()
                    .filter(|c| range.contains(c.open_time))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn supported_ranges(&self, series: &SeriesKey) -> Vec<TimeRange> {
        let Some(candles) = self.data.get(series) else {
            return Vec::new();
        };
        let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
            return Vec::new();
        };
        TimeRange::new(first.open_time, last.close_time.max(last.open_time))
            .map(|r| vec![r])
            .unwrap_or_default()
    }
}

/// Scripted raw-value feed replaying a fixed tape per instrument.
#[derive(Default)]
pub struct MockValueFeed {
    tapes: HashMap<Instrument, Vec<BuilderValue>>,
    hold_open: bool,
    unsubscribed: Mutex<Vec<Instrument>>,
}

impl MockValueFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the tape replayed for `instrument`.
    #[must_use]
    pub fn with_tape(mut self, instrument: Instrument, values: Vec<BuilderValue>) -> Self {
        self.tapes.insert(instrument, values);
        self
    }

    /// Keep subscriptions open after the tape ends instead of closing the
    /// channel, so consumers only finish when stopped.
    #[must_use]
    pub const fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Instruments for which `unsubscribe` was called, in call order.
    #[must_use]
    pub fn unsubscribe_calls(&self) -> Vec<Instrument> {
        self.unsubscribed
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ValueFeed for MockValueFeed {
    async fn subscribe(
        &self,
        instrument: &Instrument,
    ) -> Result<mpsc::Receiver<BuilderValue>, CandelaError> {
        if instrument.symbol == FAIL_SYMBOL {
            return Err(CandelaError::source("mock-feed", "forced subscribe failure"));
        }
        let tape = self.tapes.get(instrument).cloned().unwrap_or_default();
        let hold = self.hold_open;
        let (tx, rx) = mpsc::channel(tape.len().max(1));
        tokio::spawn(async move {
            for value in tape {
                if tx.send(value).await.is_err() {
                    break;
                }
            }
            if hold {
                // Park until the subscriber goes away.
                tx.closed().await;
            }
        });
        Ok(rx)
    }

    async fn unsubscribe(&self, instrument: &Instrument) {
        if let Ok(mut calls) = self.unsubscribed.lock() {
            calls.push(instrument.clone());
        }
    }
}
