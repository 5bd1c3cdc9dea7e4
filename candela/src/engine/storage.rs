use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use candela_core::{CandleEvent, CandleSource, HistoryStore};
use candela_types::{Candle, CandelaError, CandleState, SeriesKey, TimeRange};
use tokio::sync::mpsc;

use crate::core::tag_err;

enum Command {
    Start {
        series: SeriesKey,
        range: TimeRange,
        events: mpsc::Sender<CandleEvent>,
    },
    Stop(SeriesKey),
    Shutdown,
}

struct ActiveReplay {
    series: SeriesKey,
    events: mpsc::Sender<CandleEvent>,
    pending: VecDeque<Candle>,
}

/// Candle source replaying previously built candles from a history store.
///
/// One background worker owns the active set; it is spawned lazily on the
/// first start, so constructing the source needs no runtime. The worker
/// blocks on its command channel while idle and wakes on the first start
/// (or shutdown, which it honors within one cycle). Each cycle replays up
/// to the configured batch per series, every candle as an `Active`
/// snapshot followed by its `Finished` form, then yields so long replays
/// never starve commands. An exhausted or stopped series emits `Stopped`
/// and leaves the set.
pub struct StorageCandleSource {
    history: Arc<dyn HistoryStore>,
    batch: usize,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
}

impl StorageCandleSource {
    /// Source over `history`, replaying `batch` candles per cycle.
    #[must_use]
    pub fn new(history: Arc<dyn HistoryStore>, batch: usize) -> Self {
        Self {
            history,
            batch: batch.max(1),
            commands: Mutex::new(None),
        }
    }

    /// Handle to the worker, spawning it on first use. Callers are inside
    /// an async context by the trait contract.
    fn sender(&self) -> Option<mpsc::UnboundedSender<Command>> {
        let mut guard = self.commands.lock().ok()?;
        match guard.as_ref() {
            Some(tx) if !tx.is_closed() => Some(tx.clone()),
            _ => {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(worker_loop(Arc::clone(&self.history), self.batch, rx));
                *guard = Some(tx.clone());
                Some(tx)
            }
        }
    }

    /// Ask the worker to exit. Active series are dropped without `Stopped`;
    /// intended for engine teardown.
    pub fn shutdown(&self) {
        if let Ok(guard) = self.commands.lock()
            && let Some(tx) = guard.as_ref()
        {
            let _ = tx.send(Command::Shutdown);
        }
    }
}

impl Drop for StorageCandleSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl CandleSource for StorageCandleSource {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn speed_priority(&self) -> u8 {
        1
    }

    fn supported_ranges(&self, series: &SeriesKey) -> Vec<TimeRange> {
        self.history.supported_ranges(series)
    }

    async fn start(
        &self,
        series: SeriesKey,
        range: TimeRange,
        events: mpsc::Sender<CandleEvent>,
    ) -> Result<(), CandelaError> {
        let Some(tx) = self.sender() else {
            return Err(CandelaError::source("storage", "worker is gone"));
        };
        tx.send(Command::Start {
            series,
            range,
            events,
        })
        .map_err(|_| CandelaError::source("storage", "worker is gone"))
    }

    async fn stop(&self, series: &SeriesKey) {
        let tx = self
            .commands
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().cloned());
        if let Some(tx) = tx {
            let _ = tx.send(Command::Stop(series.clone()));
        }
    }
}

async fn worker_loop(
    history: Arc<dyn HistoryStore>,
    batch: usize,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut active: Vec<ActiveReplay> = Vec::new();
    loop {
        if active.is_empty() {
            // Idle: block until woken by a command.
            match commands.recv().await {
                Some(cmd) => {
                    if !apply(cmd, &history, &mut active).await {
                        return;
                    }
                }
                None => return,
            }
            continue;
        }
        while let Ok(cmd) = commands.try_recv() {
            if !apply(cmd, &history, &mut active).await {
                return;
            }
        }
        let mut i = 0;
        while i < active.len() {
            if replay_batch(&mut active[i], batch).await {
                let done = active.swap_remove(i);
                let _ = done
                    .events
                    .send(CandleEvent::Stopped {
                        series: done.series,
                    })
                    .await;
            } else {
                i += 1;
            }
        }
        tokio::task::yield_now().await;
    }
}

/// Returns `false` on shutdown.
async fn apply(
    cmd: Command,
    history: &Arc<dyn HistoryStore>,
    active: &mut Vec<ActiveReplay>,
) -> bool {
    match cmd {
        Command::Start {
            series,
            range,
            events,
        } => match history.load(&series, range).await {
            Ok(candles) => active.push(ActiveReplay {
                series,
                events,
                pending: candles.into(),
            }),
            Err(e) => {
                let _ = events
                    .send(CandleEvent::Error {
                        series: series.clone(),
                        error: tag_err("storage", e),
                    })
                    .await;
                let _ = events.send(CandleEvent::Stopped { series }).await;
            }
        },
        Command::Stop(series) => {
            if let Some(pos) = active.iter().position(|r| r.series == series) {
                let done = active.swap_remove(pos);
                let _ = done
                    .events
                    .send(CandleEvent::Stopped {
                        series: done.series,
                    })
                    .await;
            }
        }
        Command::Shutdown => return false,
    }
    true
}

/// Replay up to `batch` candles; `true` when the series is exhausted or
/// its subscriber went away.
async fn replay_batch(replay: &mut ActiveReplay, batch: usize) -> bool {
    for _ in 0..batch {
        let Some(candle) = replay.pending.pop_front() else {
            return true;
        };
        let mut live = candle.clone();
        live.state = CandleState::Active;
        let forming = CandleEvent::Candle {
            series: replay.series.clone(),
            candle: live,
        };
        if replay.events.send(forming).await.is_err() {
            return true;
        }
        let closed = CandleEvent::Candle {
            series: replay.series.clone(),
            candle,
        };
        if replay.events.send(closed).await.is_err() {
            return true;
        }
    }
    replay.pending.is_empty()
}
