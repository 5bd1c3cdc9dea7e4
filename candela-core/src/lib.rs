//! candela-core
//!
//! Source traits and candle algorithms shared across the candela ecosystem.
//!
//! - `source`: the `CandleSource`/`HistoryStore`/`ValueFeed` contracts and
//!   the `CandleEvent` message set.
//! - `coverage`: priority-ordered range claiming for multi-source requests.
//! - `compression`: the incremental candle builder, finished-candle
//!   recompression, and candle-derived helpers.
//! - `basket`: synthetic index candles combined from constituent series.
//! - `store`: the in-memory candle store with retention eviction.
//!
//! Async runtime (Tokio)
//! ---------------------
//! This crate assumes the Tokio ecosystem as the async runtime. Sources emit
//! `CandleEvent`s through `tokio::sync::mpsc` senders handed to
//! `CandleSource::start`, and `handle::TaskHandle` wraps
//! `tokio::task::JoinHandle<()>` with a `oneshot` stop signal. Code driving
//! sources must run under a Tokio 1.x runtime.
#![warn(missing_docs)]

/// Synthetic index candles combined from constituent series.
pub mod basket;
/// Incremental candle building and recompression.
pub mod compression;
/// Priority-ordered coverage planning over advertised source ranges.
pub mod coverage;
/// Task handle utilities for spawned per-series workers.
pub mod handle;
/// Source contracts and the event message set.
pub mod source;
/// In-memory candle store with retention eviction.
pub mod store;
pub mod types;
/// Normalized raw values consumed by the builder.
pub mod value;

pub use basket::BasketCandleBuilder;
pub use compression::builder::CandleBuilder;
pub use compression::compress::{Compressor, decompose};
pub use compression::ticks::candle_to_trades;
pub use coverage::{Claim, SourceCoverage, plan_coverage};
pub use source::{CandleEvent, CandleSource, HistoryStore, ValueFeed};
pub use store::CandleStore;
pub use types::*;
pub use value::BuilderValue;
