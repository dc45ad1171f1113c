//! In-memory bar provider for tests and offline runs.

use crate::market::types::{Bar, ProviderError};
use crate::market::BarProvider;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Bar provider backed by a seeded symbol map. Unseeded symbols report
/// `DataUnavailable`, mirroring how the live feed behaves for unknown
/// tickers.
#[derive(Default)]
pub struct MockBarProvider {
    bars: RwLock<HashMap<String, Vec<Bar>>>,
}

impl MockBarProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed (or replace) the bar series for a symbol.
    pub async fn set_bars(&self, symbol: &str, bars: Vec<Bar>) {
        self.bars.write().await.insert(symbol.to_string(), bars);
    }

    /// Seed a flat series: `count` daily bars all at the same close and
    /// volume. Re-seeding with a different close simulates a price move
    /// between requests.
    pub async fn set_flat_series(&self, symbol: &str, count: usize, close: Decimal, volume: u64) {
        self.set_bars(symbol, flat_bars(count, close, volume)).await;
    }

    /// Remove a symbol's bars, making subsequent requests fail.
    pub async fn clear(&self, symbol: &str) {
        self.bars.write().await.remove(symbol);
    }
}

#[async_trait]
impl BarProvider for MockBarProvider {
    async fn daily_bars(
        &self,
        symbol: &str,
        _lookback_days: u32,
    ) -> Result<Vec<Bar>, ProviderError> {
        self.bars
            .read()
            .await
            .get(symbol)
            .cloned()
            .ok_or_else(|| ProviderError::unavailable(symbol, "no seeded bars"))
    }
}

/// Build `count` consecutive daily bars, all at `close` with `volume`.
pub fn flat_bars(count: usize, close: Decimal, volume: u64) -> Vec<Bar> {
    let start = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("fixed base date is valid");

    (0..count)
        .map(|i| Bar {
            date: start + Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        })
        .collect()
}
