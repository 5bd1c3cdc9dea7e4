//! Data model and configuration primitives for the candela candle engine.
#![warn(missing_docs)]

mod candle;
mod config;
mod error;
mod instrument;
mod range;
mod series;

pub use candle::{BucketRule, Candle, CandleState, PriceLevel, Side};
pub use config::{ArithmeticPolicy, EngineConfig};
pub use error::CandelaError;
pub use instrument::{BasketInstrument, BasketLeg, CombineRule, Instrument};
pub use range::{TimeRange, join_ranges};
pub use series::SeriesKey;
