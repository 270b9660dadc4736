//! Core types and constants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type used throughout the library
pub type Timestamp = DateTime<Utc>;

/// Numeric value type of every indicator result
pub type Price = f64;

/// Materialized sequence of indicator values
pub type PriceList = Vec<Price>;

/// Distinguished "no value" marker for indicator results.
///
/// Null is NaN, never zero; consumers must test with [`is_null`] because
/// NaN does not compare equal to itself.
pub const NULL_PRICE: Price = f64::NAN;

/// Whether a value is the null sentinel
#[inline]
pub fn is_null(value: Price) -> bool {
    value.is_nan()
}

/// OHLCV bar data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: Timestamp,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: f64,
}

impl Bar {
    /// Create a new bar
    pub fn new(
        timestamp: Timestamp,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Whether high/low bracket open and close
    pub fn is_consistent(&self) -> bool {
        self.high >= self.low
            && self.open <= self.high
            && self.open >= self.low
            && self.close <= self.high
            && self.close >= self.low
    }
}
