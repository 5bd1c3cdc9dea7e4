use std::sync::Arc;

use candela_core::handle::TaskHandle;
use candela_core::{BasketCandleBuilder, CandleEvent};
use candela_types::{BasketInstrument, BucketRule, CandelaError, SeriesKey, TimeRange};
use tokio::sync::{mpsc, oneshot};

use crate::core::{EngineInner, SeriesSubscription, start_series, stop_series};

/// Start a synthetic basket series.
///
/// Every leg is started as an ordinary series on the engine; their finished
/// candles are folded through a [`BasketCandleBuilder`] and the synthetic
/// output is stored and published under the basket's own key. A leg start
/// failure unwinds the legs already running. The basket's single `Stopped`
/// fires only after every leg has delivered its own.
pub(crate) async fn start_basket(
    inner: &Arc<EngineInner>,
    basket: BasketInstrument,
    rule: BucketRule,
    window: TimeRange,
) -> Result<SeriesSubscription, CandelaError> {
    let basket_series = SeriesKey::new(basket.as_instrument(), rule, window);
    if inner.active.lock().await.contains_key(&basket_series) {
        return Err(CandelaError::duplicate_series(basket_series.to_string()));
    }

    let builder = BasketCandleBuilder::new(basket, rule, inner.cfg.arithmetic_policy);
    let leg_keys = builder.leg_series(rule, window);

    let mut legs = Vec::with_capacity(leg_keys.len());
    for key in &leg_keys {
        match start_series(inner, key.clone()).await {
            Ok(sub) => legs.push(sub),
            Err(e) => {
                for started in &legs {
                    stop_series(inner, &started.series).await;
                }
                return Err(e);
            }
        }
    }

    inner.store.start(&basket_series);

    let generation = inner.next_generation();
    let (event_tx, event_rx) = mpsc::channel(inner.cfg.channel_capacity);
    let (stop_tx, stop_rx) = oneshot::channel();
    let race_keys = leg_keys.clone();
    let join = spawn_basket(BasketParams {
        series: basket_series.clone(),
        leg_keys,
        legs,
        builder,
        generation,
        inner: Arc::clone(inner),
        downstream: event_tx,
        stop_rx,
    });

    let mut active = inner.active.lock().await;
    if active.contains_key(&basket_series) {
        // Lost a start race while the legs were coming up.
        drop(active);
        join.abort();
        for key in &race_keys {
            stop_series(inner, key).await;
        }
        return Err(CandelaError::duplicate_series(basket_series.to_string()));
    }
    EngineInner::register(
        &mut active,
        basket_series.clone(),
        generation,
        TaskHandle::new(join, stop_tx),
    );
    drop(active);

    Ok(SeriesSubscription {
        series: basket_series,
        receiver: event_rx,
    })
}

struct BasketParams {
    series: SeriesKey,
    leg_keys: Vec<SeriesKey>,
    legs: Vec<SeriesSubscription>,
    builder: BasketCandleBuilder,
    generation: u64,
    inner: Arc<EngineInner>,
    downstream: mpsc::Sender<CandleEvent>,
    stop_rx: oneshot::Receiver<()>,
}

fn spawn_basket(params: BasketParams) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let BasketParams {
            series,
            leg_keys,
            legs,
            mut builder,
            generation,
            inner,
            downstream,
            mut stop_rx,
        } = params;

        // Leg events funnel into one channel; each forwarder ends when its
        // subscription does.
        let (merged_tx, mut merged) = mpsc::channel(inner.cfg.channel_capacity);
        let mut remaining = legs.len();
        for mut leg in legs {
            let tx = merged_tx.clone();
            tokio::spawn(async move {
                while let Some(ev) = leg.recv().await {
                    if tx.send(ev).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(merged_tx);

        let mut stopping = false;
        while remaining > 0 {
            tokio::select! {
                _ = &mut stop_rx, if !stopping => {
                    stopping = true;
                    for key in &leg_keys {
                        stop_series(&inner, key).await;
                    }
                }
                ev = merged.recv() => match ev {
                    Some(CandleEvent::Candle { candle, .. }) => {
                        match builder.process_candle(&candle) {
                            Ok(ready) => {
                                for synthetic in ready {
                                    inner.store.add(&series, synthetic.clone());
                                    let _ = downstream
                                        .send(CandleEvent::Candle {
                                            series: series.clone(),
                                            candle: synthetic,
                                        })
                                        .await;
                                }
                            }
                            Err(error) => {
                                let fatal = error.is_fatal();
                                #[cfg(feature = "tracing")]
                                tracing::warn!(series = %series, error = %error, fatal, "basket combination failed");
                                let _ = downstream
                                    .send(CandleEvent::Error {
                                        series: series.clone(),
                                        error,
                                    })
                                    .await;
                                if fatal && !stopping {
                                    stopping = true;
                                    for key in &leg_keys {
                                        stop_series(&inner, key).await;
                                    }
                                }
                            }
                        }
                    }
                    Some(CandleEvent::Error { series: leg, error }) => {
                        let _ = downstream
                            .send(CandleEvent::Error { series: leg, error })
                            .await;
                    }
                    Some(CandleEvent::Stopped { .. }) => remaining -= 1,
                    None => break,
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
