use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{Candle, SeriesKey, TimeRange};

/// In-memory candle store with retention-based eviction.
///
/// One entry per started series, indexed by open time. Readers always get
/// point-in-time copies; writers never hand out references into the map.
///
/// Retention: with a keep-window `K`, the sweep fires once the span from the
/// oldest retained to the latest open time exceeds `1.5 * K`, and then drops
/// everything older than `latest - K`. The slack keeps eviction amortized
/// instead of per-insert. `K == 0` disables eviction.
#[derive(Debug)]
pub struct CandleStore {
    keep: chrono::Duration,
    inner: RwLock<HashMap<SeriesKey, SeriesEntry>>,
}

#[derive(Debug)]
struct SeriesEntry {
    by_open: BTreeMap<DateTime<Utc>, Vec<Candle>>,
    oldest_retained: Option<DateTime<Utc>>,
}

impl CandleStore {
    /// Store with the given keep-window. `Duration::ZERO` disables eviction.
    #[must_use]
    pub fn new(keep: Duration) -> Self {
        let keep = chrono::Duration::from_std(keep).unwrap_or(chrono::Duration::MAX);
        Self {
            keep,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or re-register) a series, clearing any previous content.
    /// The retention watermark starts at the series window's lower bound.
    pub fn start(&self, series: &SeriesKey) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(series.clone(), SeriesEntry::seeded(series));
        }
    }

    /// Insert a candle snapshot.
    ///
    /// An `Active` snapshot replaces the previous `Active` snapshot at the
    /// same open time. A `Finished` candle replaces its own `Active`
    /// predecessor; re-adding an identical finished candle is a no-op.
    /// Returns `false` when nothing changed (unknown series or duplicate).
    pub fn add(&self, series: &SeriesKey, candle: Candle) -> bool {
        let Ok(mut map) = self.inner.write() else {
            return false;
        };
        let Some(entry) = map.get_mut(series) else {
            return false;
        };
        let slot = entry.by_open.entry(candle.open_time).or_default();
        if candle.is_finished() && slot.contains(&candle) {
            return false;
        }
        // One in-progress snapshot per open time: the newest wins.
        if let Some(active) = slot.iter_mut().find(|c| !c.is_finished()) {
            *active = candle;
        } else {
            slot.push(candle);
        }
        entry.sweep(self.keep);
        true
    }

    /// All candles whose bucket opened exactly at `time`.
    #[must_use]
    pub fn candles_at(&self, series: &SeriesKey, time: DateTime<Utc>) -> Vec<Candle> {
        self.read_entry(series, |entry| {
            entry.by_open.get(&time).cloned().unwrap_or_default()
        })
    }

    /// All candles whose open time falls inside `range`, oldest first.
    #[must_use]
    pub fn candles_in(&self, series: &SeriesKey, range: TimeRange) -> Vec<Candle> {
        self.read_entry(series, |entry| {
            entry
                .by_open
                .range(range.start()..=range.end())
                .flat_map(|(_, v)| v.iter().cloned())
                .collect()
        })
    }

    /// The most recent `n` candles, returned oldest first.
    #[must_use]
    pub fn last_n(&self, series: &SeriesKey, n: usize) -> Vec<Candle> {
        self.read_entry(series, |entry| {
            let mut out: Vec<Candle> = entry
                .by_open
                .values()
                .rev()
                .flat_map(|v| v.iter().rev().cloned())
                .take(n)
                .collect();
            out.reverse();
            out
        })
    }

    /// The candle `idx` positions from the end (`0` is the latest).
    #[must_use]
    pub fn candle_from_end(&self, series: &SeriesKey, idx: usize) -> Option<Candle> {
        self.read_entry(series, |entry| {
            entry
                .by_open
                .values()
                .rev()
                .flat_map(|v| v.iter().rev())
                .nth(idx)
                .cloned()
        })
    }

    /// Number of retained candles for the series.
    #[must_use]
    pub fn candle_count(&self, series: &SeriesKey) -> usize {
        self.read_entry(series, |entry| entry.by_open.values().map(Vec::len).sum())
    }

    /// Drop all content of the series, keeping it registered.
    pub fn reset(&self, series: &SeriesKey) {
        if let Ok(mut map) = self.inner.write()
            && let Some(entry) = map.get_mut(series)
        {
            *entry = SeriesEntry::seeded(series);
        }
    }

    /// Remove the series entirely.
    pub fn remove(&self, series: &SeriesKey) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(series);
        }
    }

    fn read_entry<T: Default>(&self, series: &SeriesKey, f: impl FnOnce(&SeriesEntry) -> T) -> T {
        self.inner
            .read()
            .ok()
            .and_then(|map| map.get(series).map(f))
            .unwrap_or_default()
    }
}

impl SeriesEntry {
    fn seeded(series: &SeriesKey) -> Self {
        Self {
            by_open: BTreeMap::new(),
            oldest_retained: Some(series.window.start()),
        }
    }

    fn sweep(&mut self, keep: chrono::Duration) {
        if keep.is_zero() || keep == chrono::Duration::MAX {
            return;
        }
        let Some((&latest, _)) = self.by_open.last_key_value() else {
            return;
        };
        let oldest = match (self.oldest_retained, self.by_open.first_key_value()) {
            (Some(t), _) => t,
            (None, Some((&t, _))) => t,
            (None, None) => return,
        };
        if latest - oldest <= keep + keep / 2 {
            return;
        }
        let cutoff = latest - keep;
        self.by_open = self.by_open.split_off(&cutoff);
        self.oldest_retained = Some(cutoff);
    }
}
