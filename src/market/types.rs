//! Bar data types and provider errors.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One trading day's OHLCV record for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

/// Errors from a bar provider. Both variants are per-symbol and recoverable:
/// a batch scan drops the symbol and continues.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no bar data for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("bar request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    /// Shorthand for the data-unavailable case.
    pub fn unavailable(symbol: &str, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}
