//! Configuration management for the RVOL screener.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Market data feed settings
    #[serde(default)]
    pub market: MarketDataConfig,
    /// Scanner windows, thresholds, and universe
    #[serde(default)]
    pub scanner: ScannerConfig,
    /// Paper portfolio settings
    #[serde(default)]
    pub portfolio: PortfolioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    /// Base URL of the Yahoo Finance chart API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Symbols to scan (defaults to the Nifty 50)
    #[serde(default = "default_universe")]
    pub universe: Vec<String>,
    /// Calendar days of history to request per symbol; padded above the
    /// baseline window to tolerate weekends and market holidays
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Bars in the recent volume average
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
    /// Bars in the baseline volume average; also the minimum history a
    /// symbol needs to be scannable. The baseline window includes the
    /// recent window: the overlap is the defined signal contract.
    #[serde(default = "default_baseline_window")]
    pub baseline_window: usize,
    /// RVOL must exceed this (strictly) for a gem classification
    #[serde(default = "default_min_rvol")]
    pub min_rvol: Decimal,
    /// Lower bound (inclusive, percent) of the gem price-change band
    #[serde(default = "default_price_change_floor")]
    pub price_change_floor: Decimal,
    /// Upper bound (inclusive, percent) of the gem price-change band
    #[serde(default = "default_price_change_ceiling")]
    pub price_change_ceiling: Decimal,
    /// Per-symbol fetch-and-compute timeout in seconds; a slow symbol is
    /// dropped from the batch, never stalling the whole scan
    #[serde(default = "default_symbol_timeout")]
    pub symbol_timeout_secs: u64,
    /// Maximum concurrent bar fetches during a scan
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Default number of entries for top-N queries
    #[serde(default = "default_top_count")]
    pub top_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Paper cash balance at process start
    #[serde(default = "default_starting_cash")]
    pub starting_cash: Decimal,
}

/// Nifty 50 constituents, Yahoo Finance ticker format.
const NIFTY_50: &[&str] = &[
    "RELIANCE.NS",
    "TCS.NS",
    "HDFCBANK.NS",
    "INFY.NS",
    "ICICIBANK.NS",
    "HINDUNILVR.NS",
    "ITC.NS",
    "SBIN.NS",
    "BHARTIARTL.NS",
    "BAJFINANCE.NS",
    "AXISBANK.NS",
    "LT.NS",
    "ASIANPAINT.NS",
    "MARUTI.NS",
    "WIPRO.NS",
    "HDFC.NS",
    "KOTAKBANK.NS",
    "NESTLEIND.NS",
    "TITAN.NS",
    "ULTRACEMCO.NS",
    "M&M.NS",
    "ONGC.NS",
    "POWERGRID.NS",
    "TECHM.NS",
    "BRITANNIA.NS",
    "JSWSTEEL.NS",
    "GRASIM.NS",
    "ADANIPORTS.NS",
    "HEROMOTOCO.NS",
    "COALINDIA.NS",
    "UPL.NS",
    "IOC.NS",
    "HINDALCO.NS",
    "SUNPHARMA.NS",
    "DRREDDY.NS",
    "TATAMOTORS.NS",
    "TATASTEEL.NS",
    "EICHERMOT.NS",
    "CIPLA.NS",
    "BPCL.NS",
    "SHREECEM.NS",
    "DIVISLAB.NS",
    "HCLTECH.NS",
    "NTPC.NS",
    "BAJAJFINSV.NS",
    "INDUSINDBK.NS",
    "BAJAJ-AUTO.NS",
    "HDFCLIFE.NS",
    "SBILIFE.NS",
    "APOLLOHOSP.NS",
    "VEDL.NS",
];

// Default value functions
fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_universe() -> Vec<String> {
    NIFTY_50.iter().map(|s| s.to_string()).collect()
}

fn default_lookback_days() -> u32 {
    100 // calendar days, yields >= 91 trading days in practice
}

fn default_recent_window() -> usize {
    10
}

fn default_baseline_window() -> usize {
    91
}

fn default_min_rvol() -> Decimal {
    Decimal::new(2, 0) // 2.0
}

fn default_price_change_floor() -> Decimal {
    Decimal::new(-1, 0) // -1.0%
}

fn default_price_change_ceiling() -> Decimal {
    Decimal::new(2, 0) // +2.0%
}

fn default_symbol_timeout() -> u64 {
    10
}

fn default_max_concurrent() -> usize {
    10
}

fn default_top_count() -> usize {
    20
}

fn default_starting_cash() -> Decimal {
    Decimal::new(10_000_000, 0) // one crore of paper money
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("RVS"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.scanner.universe.is_empty(),
            "scanner universe must not be empty"
        );

        anyhow::ensure!(
            self.scanner.recent_window >= 1,
            "recent_window must be at least 1"
        );

        anyhow::ensure!(
            self.scanner.baseline_window >= self.scanner.recent_window
                && self.scanner.baseline_window >= 2,
            "baseline_window must cover the recent window and at least 2 bars"
        );

        anyhow::ensure!(
            self.scanner.lookback_days as usize >= self.scanner.baseline_window,
            "lookback_days must cover the baseline window"
        );

        anyhow::ensure!(
            self.scanner.price_change_floor <= self.scanner.price_change_ceiling,
            "price_change_floor must not exceed price_change_ceiling"
        );

        anyhow::ensure!(
            self.scanner.min_rvol >= Decimal::ZERO,
            "min_rvol must not be negative"
        );

        anyhow::ensure!(
            self.scanner.max_concurrent >= 1,
            "max_concurrent must be at least 1"
        );

        anyhow::ensure!(
            self.portfolio.starting_cash >= Decimal::ZERO,
            "starting_cash must not be negative"
        );

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            market: MarketDataConfig::default(),
            scanner: ScannerConfig::default(),
            portfolio: PortfolioConfig::default(),
        }
    }
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            universe: default_universe(),
            lookback_days: default_lookback_days(),
            recent_window: default_recent_window(),
            baseline_window: default_baseline_window(),
            min_rvol: default_min_rvol(),
            price_change_floor: default_price_change_floor(),
            price_change_ceiling: default_price_change_ceiling(),
            symbol_timeout_secs: default_symbol_timeout(),
            max_concurrent: default_max_concurrent(),
            top_count: default_top_count(),
        }
    }
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            starting_cash: default_starting_cash(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_universe_is_nifty_50() {
        let config = Config::default();
        assert_eq!(config.scanner.universe.len(), 51);
        assert!(config.scanner.universe.iter().all(|s| s.ends_with(".NS")));
    }

    #[test]
    fn test_rejects_baseline_shorter_than_recent_window() {
        let mut config = Config::default();
        config.scanner.recent_window = 20;
        config.scanner.baseline_window = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_price_band() {
        let mut config = Config::default();
        config.scanner.price_change_floor = Decimal::new(3, 0);
        assert!(config.validate().is_err());
    }
}
