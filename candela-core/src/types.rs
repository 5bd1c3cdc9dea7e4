//! Re-export of foundational types from `candela-types`.
// Consolidated re-exports so downstream crates can depend on `candela-core` only

pub use candela_types::{
    ArithmeticPolicy, BasketInstrument, BasketLeg, BucketRule, Candle, CandleState, CandelaError,
    CombineRule, EngineConfig, Instrument, PriceLevel, SeriesKey, Side, TimeRange, join_ranges,
};

pub use rust_decimal::Decimal;
