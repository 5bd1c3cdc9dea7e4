//! Candela orchestrates candle series across multiple ranked sources.
//!
//! Overview
//! - Plans coverage of a requested window across registered sources by
//!   speed priority, then drives the resulting claims sequentially.
//! - Stores every produced candle in an in-memory store with retention
//!   eviction, and forwards it to the per-series subscription channel.
//! - Builds live candles from raw value feeds, replays stored candles in
//!   batches, and synthesizes basket (index) candles from constituents.
//!
//! Key behaviors and trade-offs
//! - Sequential source chain: claims are served one at a time in window
//!   order, so a subscriber sees candles in range order even when they come
//!   from different sources; slower sources only run for the gaps faster
//!   ones cannot cover.
//! - Store reads return point-in-time copies; holding a query result never
//!   blocks writers.
//! - Stopping is cooperative and idempotent: the active source finishes its
//!   in-flight work, exactly one `Stopped` event closes the subscription.
//!
//! Building an engine and starting a series:
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use candela::{CandleEngine, FeedCandleSource, StorageCandleSource};
//! use candela_core::{BucketRule, Instrument, SeriesKey, TimeRange};
//!
//! let engine = CandleEngine::builder()
//!     .with_source(Arc::new(FeedCandleSource::new(feed)))
//!     .with_source(Arc::new(StorageCandleSource::new(history, 100)))
//!     .build()?;
//!
//! let series = SeriesKey::new(
//!     Instrument::new("AAPL"),
//!     BucketRule::TimeFrame(Duration::from_secs(60)),
//!     TimeRange::new(from, to)?,
//! );
//! let mut sub = engine.start(series).await?;
//! while let Some(event) = sub.recv().await {
//!     // CandleEvent::Candle / Error, terminated by CandleEvent::Stopped
//! }
//! ```
//!
//! See the crate tests for end-to-end flows against mock sources.
#![warn(missing_docs)]

pub(crate) mod core;
mod engine;

pub use core::{CandleEngine, CandleEngineBuilder, SeriesSubscription};
pub use engine::feed::FeedCandleSource;
pub use engine::storage::StorageCandleSource;

// Re-export core types for convenience
pub use candela_core::{
    // Traits and contracts
    BasketCandleBuilder,
    BuilderValue,
    CandleBuilder,
    CandleEvent,
    CandleSource,
    CandleStore,
    Claim,
    Compressor,
    HistoryStore,
    SourceCoverage,
    ValueFeed,
    candle_to_trades,
    plan_coverage,
};
pub use candela_types::{
    ArithmeticPolicy, BasketInstrument, BasketLeg, BucketRule, Candle, CandelaError, CandleState,
    CombineRule, EngineConfig, Instrument, PriceLevel, SeriesKey, Side, TimeRange, join_ranges,
};
