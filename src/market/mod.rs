//! Historical market data feed.
//!
//! The scanner only depends on the [`BarProvider`] contract: a source of
//! chronologically ordered daily OHLCV bars per symbol. Two implementations
//! live here:
//!
//! - [`YahooFinanceClient`]: the Yahoo Finance v8 chart API over HTTPS
//! - [`MockBarProvider`]: in-memory bars for tests and offline runs

pub mod mock;
mod types;
mod yahoo;

pub use mock::MockBarProvider;
pub use types::{Bar, ProviderError};
pub use yahoo::YahooFinanceClient;

use async_trait::async_trait;

/// Source of historical daily bars for a symbol.
///
/// Implementations must return bars ascending by date. `lookback_days` is a
/// calendar-day range; the number of bars returned is usually smaller because
/// of weekends and market holidays.
#[async_trait]
pub trait BarProvider: Send + Sync {
    async fn daily_bars(&self, symbol: &str, lookback_days: u32)
        -> Result<Vec<Bar>, ProviderError>;
}
