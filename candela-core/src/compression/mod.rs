//! Incremental candle building and recompression.
//!
//! `builder` turns raw values into candles under any [`crate::BucketRule`];
//! `compress` rebuilds larger candles from finished smaller ones; `ticks`
//! reconstructs representative trades from a finished candle; `profile`
//! maintains the per-price volume ladder.

pub mod builder;
pub mod compress;
pub mod profile;
pub mod ticks;
