use std::sync::Arc;

use candela_core::{Claim, CandleEvent};
use candela_types::SeriesKey;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::core::{EngineInner, tag_err};

pub(crate) struct ChainParams {
    pub series: SeriesKey,
    /// Planned claims, sorted by range start.
    pub claims: Vec<Claim>,
    /// Registry generation identifying this driver's own entry.
    pub generation: u64,
    pub inner: Arc<EngineInner>,
    pub downstream: mpsc::Sender<CandleEvent>,
}

/// Drive a series' claims sequentially.
///
/// One source runs at a time; its `Stopped` hands over to the next claim.
/// A stop signal (or a dropped handle) suppresses further starts, asks the
/// active source to stop, and waits for its completion. Exactly one
/// `Stopped` goes downstream, after which the task deregisters itself.
pub(crate) fn spawn_chain(params: ChainParams, stop_rx: oneshot::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ChainParams {
            series,
            claims,
            generation,
            inner,
            downstream,
        } = params;
        let mut stop_rx = stop_rx;
        let (src_tx, mut src_rx) = mpsc::channel(inner.cfg.channel_capacity);

        let mut next_claim = 0usize;
        let mut active: Option<usize> = None;
        let mut stopping = false;

        loop {
            if active.is_none() {
                if stopping || next_claim >= claims.len() {
                    break;
                }
                let claim = claims[next_claim];
                next_claim += 1;
                let source = &inner.sources[claim.source];
                match source
                    .start(series.clone(), claim.range, src_tx.clone())
                    .await
                {
                    Ok(()) => active = Some(claim.source),
                    Err(e) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(series = %series, source = source.name(), error = %e, "claim start failed");
                        let _ = downstream
                            .send(CandleEvent::Error {
                                series: series.clone(),
                                error: tag_err(source.name(), e),
                            })
                            .await;
                        continue;
                    }
                }
            }

            tokio::select! {
                _ = &mut stop_rx, if !stopping => {
                    stopping = true;
                    if let Some(idx) = active {
                        inner.sources[idx].stop(&series).await;
                        // keep looping until the source confirms with Stopped
                    }
                }
                ev = src_rx.recv() => match ev {
                    Some(CandleEvent::Candle { series: s, candle }) if s == series => {
                        inner.store.add(&series, candle.clone());
                        let _ = downstream
                            .send(CandleEvent::Candle { series: s, candle })
                            .await;
                    }
                    Some(CandleEvent::Stopped { series: s }) if s == series => {
                        active = None;
                    }
                    Some(CandleEvent::Error { series: s, error }) if s == series => {
                        let _ = downstream
                            .send(CandleEvent::Error { series: s, error })
                            .await;
                    }
                    // Cross-talk from a source shared between series.
                    Some(_) => {}
                    None => {
                        active = None;
                        stopping = true;
                    }
                },
            }
        }

        let _ = downstream
            .send(CandleEvent::Stopped {
                series: series.clone(),
            })
            .await;
        inner.deregister(&series, generation).await;
    })
}
