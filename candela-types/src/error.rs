use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the candela workspace.
///
/// This wraps argument validation errors, data-consistency failures,
/// source-tagged runtime failures, and the fatal conditions raised by the
/// basket synthesizer.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CandelaError {
    /// A time range was constructed with its lower bound after its upper bound.
    #[error("invalid time range: min {min} > max {max}")]
    InvalidRange {
        /// Requested lower bound.
        min: DateTime<Utc>,
        /// Requested upper bound.
        max: DateTime<Utc>,
    },

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Issues with the returned or expected data (out-of-order values, etc.).
    #[error("data issue: {0}")]
    Data(String),

    /// The series is already active on the engine.
    #[error("series already started: {series}")]
    DuplicateSeries {
        /// Display form of the offending series key.
        series: String,
    },

    /// An individual candle source returned an error.
    #[error("{origin} failed: {msg}")]
    Source {
        /// Source name that failed.
        origin: String,
        /// Human-readable error message.
        msg: String,
    },

    /// A basket combination could not be computed (e.g. zero total weight).
    #[error("arithmetic failure in {series}: {msg}")]
    Arithmetic {
        /// Display form of the basket series.
        series: String,
        /// Human-readable description of the failed computation.
        msg: String,
    },

    /// A basket bucket can no longer be resolved from its constituents.
    #[error("unresolvable bucket for {series} at {open_time}")]
    UnresolvableBucket {
        /// Display form of the basket series.
        series: String,
        /// Open time of the bucket that could not be filled.
        open_time: DateTime<Utc>,
    },

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),
}

impl CandelaError {
    /// Helper: build an `InvalidArg` error.
    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        Self::InvalidArg(msg.into())
    }

    /// Helper: build a `Data` error.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// Helper: build a `Source` error with the source name and message.
    pub fn source(origin: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Source {
            origin: origin.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build an `Arithmetic` error for a basket series.
    pub fn arithmetic(series: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Arithmetic {
            series: series.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `DuplicateSeries` error from a series display string.
    pub fn duplicate_series(series: impl Into<String>) -> Self {
        Self::DuplicateSeries {
            series: series.into(),
        }
    }

    /// Returns `true` for errors that terminate a series rather than being
    /// reported and skipped.
    ///
    /// `UnresolvableBucket` always terminates; `Arithmetic` terminates only
    /// under [`crate::ArithmeticPolicy::Propagate`], which the caller decides.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::UnresolvableBucket { .. })
    }
}
