//! Yahoo Finance v8 chart API client.
//!
//! Public, unauthenticated endpoint. One request per symbol returns the
//! daily bars for a calendar-day range; rows with missing fields (halted
//! sessions, partial days) are dropped so callers always see complete bars.

use crate::config::MarketDataConfig;
use crate::market::types::{Bar, ProviderError};
use crate::market::BarProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

/// HTTP client for the Yahoo Finance chart API.
pub struct YahooFinanceClient {
    http: Client,
    base_url: String,
}

impl YahooFinanceClient {
    /// Create a new client from configuration.
    pub fn new(config: &MarketDataConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("rvol-screener/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BarProvider for YahooFinanceClient {
    async fn daily_bars(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<Bar>, ProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let range = format!("{lookback_days}d");
        let response = self
            .http
            .get(&url)
            .query(&[("interval", "1d"), ("range", range.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::unavailable(
                symbol,
                format!("HTTP {}", response.status()),
            ));
        }

        let body: ChartResponse = response.json().await?;

        if let Some(err) = body.chart.error {
            return Err(ProviderError::unavailable(
                symbol,
                format!("{}: {}", err.code, err.description),
            ));
        }

        let result = body
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::unavailable(symbol, "empty chart result"))?;

        let bars = bars_from_chart(symbol, result)?;
        debug!(%symbol, bars = bars.len(), "Fetched daily bars");
        Ok(bars)
    }
}

// ==================== Wire Types ====================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteColumns>,
}

/// Column-oriented OHLCV arrays, index-aligned with `timestamp`.
#[derive(Debug, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

fn bars_from_chart(symbol: &str, result: ChartResult) -> Result<Vec<Bar>, ProviderError> {
    let columns = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::unavailable(symbol, "missing quote columns"))?;

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        // Incomplete rows are skipped, not errors: the chart API pads the
        // range with nulls for sessions without trades.
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
            column(&columns.open, i),
            column(&columns.high, i),
            column(&columns.low, i),
            column(&columns.close, i),
            column(&columns.volume, i),
        ) else {
            continue;
        };
        let Some(date) = Utc.timestamp_opt(*ts, 0).single() else {
            continue;
        };
        let (Some(open), Some(high), Some(low), Some(close)) =
            (dec(open), dec(high), dec(low), dec(close))
        else {
            continue;
        };

        bars.push(Bar {
            date,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    if bars.is_empty() {
        return Err(ProviderError::unavailable(symbol, "no complete daily bars"));
    }
    Ok(bars)
}

fn column<T: Copy>(values: &[Option<T>], index: usize) -> Option<T> {
    values.get(index).copied().flatten()
}

fn dec(value: f64) -> Option<Decimal> {
    Decimal::from_f64_retain(value)
}
