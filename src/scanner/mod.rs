//! Relative-volume (RVOL) scanner.
//!
//! Ranks a universe of symbols by the ratio of recent average volume to a
//! longer trailing average. A symbol whose RVOL exceeds the configured
//! threshold while its price change stays inside a narrow band is classified
//! as a "gem": volume building before a price move.

use crate::config::ScannerConfig;
use crate::market::{Bar, BarProvider, ProviderError};
use crate::utils::decimal::{pct_change, safe_div};
use futures_util::{stream, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Per-symbol signal failures. Every variant is recoverable at the batch
/// level: `scan` tallies and drops the symbol, single-symbol callers get the
/// error with the violated constraint.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("insufficient history for {symbol}: need {required} bars, got {actual}")]
    InsufficientHistory {
        symbol: String,
        required: usize,
        actual: usize,
    },

    #[error("unusable bar data for {symbol}: non-positive close")]
    BadBarData { symbol: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("bar fetch for {symbol} timed out")]
    Timeout { symbol: String },

    /// Post-validation impossibility. Unreachable while the provider
    /// contract holds; a defect, not a user-facing condition.
    #[error("internal computation error: {0}")]
    Internal(&'static str),
}

/// Volume-ratio signal for one symbol, derived fresh from the latest bar
/// plus trailing statistics. Never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub symbol: String,
    pub rvol: Decimal,
    pub current_price: Decimal,
    pub price_change_pct: Decimal,
    pub volume: u64,
    pub high: Decimal,
    pub low: Decimal,
    pub open: Decimal,
}

/// A classified quote, immutable once returned from a scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    #[serde(flatten)]
    pub quote: Quote,
    pub is_gem: bool,
}

/// Computes and ranks RVOL signals across the configured universe.
pub struct RvolScanner {
    provider: Arc<dyn BarProvider>,
    config: ScannerConfig,
}

impl RvolScanner {
    /// Create a new scanner over a bar provider.
    pub fn new(provider: Arc<dyn BarProvider>, config: ScannerConfig) -> Self {
        Self { provider, config }
    }

    /// Compute the RVOL quote for a single symbol.
    ///
    /// RVOL = mean volume of the last `recent_window` bars divided by the
    /// mean volume of the last `baseline_window` bars. The baseline window
    /// includes the recent window; the overlap dampens the ratio and is the
    /// defined contract, not an artifact.
    #[instrument(skip(self))]
    pub async fn compute_signal(&self, symbol: &str) -> Result<Quote, SignalError> {
        let bars = self
            .provider
            .daily_bars(symbol, self.config.lookback_days)
            .await?;

        // Two bars minimum regardless of window size: the previous close is
        // needed for the price-change percentage.
        let required = self.config.baseline_window.max(2);
        if bars.len() < required {
            return Err(SignalError::InsufficientHistory {
                symbol: symbol.to_string(),
                required,
                actual: bars.len(),
            });
        }

        let recent_avg = mean_volume(&bars[bars.len() - self.config.recent_window..]);
        let baseline_avg = mean_volume(&bars[bars.len() - self.config.baseline_window..]);
        let rvol = safe_div(recent_avg, baseline_avg);

        let latest = bars
            .last()
            .ok_or(SignalError::Internal("validated bar sequence is empty"))?;
        let previous = bars
            .get(bars.len() - 2)
            .ok_or(SignalError::Internal("validated bar sequence lost its previous bar"))?;

        if latest.close <= Decimal::ZERO || previous.close <= Decimal::ZERO {
            return Err(SignalError::BadBarData {
                symbol: symbol.to_string(),
            });
        }

        Ok(Quote {
            symbol: symbol.to_string(),
            rvol,
            current_price: latest.close,
            price_change_pct: pct_change(latest.close, previous.close),
            volume: latest.volume,
            high: latest.high,
            low: latest.low,
            open: latest.open,
        })
    }

    /// Classify a quote against the gem thresholds: RVOL strictly above the
    /// minimum, price change inside the band (both bounds inclusive).
    pub fn classify(&self, quote: Quote) -> ScanResult {
        let is_gem = quote.rvol > self.config.min_rvol
            && quote.price_change_pct >= self.config.price_change_floor
            && quote.price_change_pct <= self.config.price_change_ceiling;
        ScanResult { quote, is_gem }
    }

    /// Scan the whole universe and return classified results ranked by the
    /// descending composite key `(is_gem, rvol)`: gems always sort above
    /// non-gems, higher RVOL first within each group. Ties keep universe
    /// order (stable sort over an order-preserving fetch).
    ///
    /// Per-symbol failures never abort the batch: each is tallied, logged,
    /// and dropped.
    pub async fn scan(&self) -> Vec<ScanResult> {
        let per_symbol = Duration::from_secs(self.config.symbol_timeout_secs);

        let outcomes: Vec<Result<ScanResult, SignalError>> =
            stream::iter(self.config.universe.clone())
                .map(|symbol| async move {
                    match tokio::time::timeout(per_symbol, self.compute_signal(&symbol)).await {
                        Ok(Ok(quote)) => Ok(self.classify(quote)),
                        Ok(Err(err)) => Err(err),
                        Err(_) => Err(SignalError::Timeout { symbol }),
                    }
                })
                .buffered(self.config.max_concurrent)
                .collect()
                .await;

        let scanned = outcomes.len();
        let mut dropped_history = 0usize;
        let mut dropped_unavailable = 0usize;
        let mut dropped_timeout = 0usize;

        let mut results = Vec::with_capacity(scanned);
        for outcome in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(err) => {
                    match err {
                        SignalError::InsufficientHistory { .. } => dropped_history += 1,
                        SignalError::Timeout { .. } => dropped_timeout += 1,
                        _ => dropped_unavailable += 1,
                    }
                    debug!(error = %err, "Symbol dropped from scan");
                }
            }
        }

        results.sort_by(|a, b| (b.is_gem, b.quote.rvol).cmp(&(a.is_gem, a.quote.rvol)));

        let gems = results.iter().filter(|r| r.is_gem).count();
        info!(
            scanned,
            ranked = results.len(),
            gems,
            dropped_history,
            dropped_unavailable,
            dropped_timeout,
            "Universe scan complete"
        );

        results
    }

    /// First `count` entries of a full scan; all available entries when
    /// fewer symbols succeeded.
    pub async fn top_n(&self, count: usize) -> Vec<ScanResult> {
        let mut results = self.scan().await;
        results.truncate(count);
        results
    }
}

fn mean_volume(bars: &[Bar]) -> Decimal {
    if bars.is_empty() {
        return Decimal::ZERO;
    }
    let total: u64 = bars.iter().map(|b| b.volume).sum();
    Decimal::from(total) / Decimal::from(bars.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::mock::{flat_bars, MockBarProvider};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    // =========================================================================
    // Test Helpers
    // =========================================================================

    fn test_config(universe: &[&str]) -> ScannerConfig {
        ScannerConfig {
            universe: universe.iter().map(|s| s.to_string()).collect(),
            symbol_timeout_secs: 10,
            ..ScannerConfig::default()
        }
    }

    fn scanner_over(provider: Arc<MockBarProvider>, universe: &[&str]) -> RvolScanner {
        RvolScanner::new(provider, test_config(universe))
    }

    /// 81 baseline-only bars at `early_volume`, then 10 recent bars at
    /// `recent_volume`. Close of the final two bars set from `prev_close`
    /// and `last_close` to pin the price-change percentage.
    fn volume_profile(
        early_volume: u64,
        recent_volume: u64,
        prev_close: Decimal,
        last_close: Decimal,
    ) -> Vec<Bar> {
        let mut bars = flat_bars(91, prev_close, early_volume);
        let len = bars.len();
        for bar in &mut bars[len - 10..] {
            bar.volume = recent_volume;
        }
        bars[len - 1].close = last_close;
        bars
    }

    fn quote_with(rvol: Decimal, price_change_pct: Decimal) -> Quote {
        Quote {
            symbol: "TEST.NS".to_string(),
            rvol,
            current_price: dec!(100),
            price_change_pct,
            volume: 1_000_000,
            high: dec!(101),
            low: dec!(99),
            open: dec!(100),
        }
    }

    // =========================================================================
    // Signal Computation Tests
    // =========================================================================

    #[tokio::test]
    async fn test_constant_volume_gives_rvol_one() {
        let provider = Arc::new(MockBarProvider::new());
        provider.set_flat_series("A.NS", 91, dec!(2500), 500_000).await;
        let scanner = scanner_over(provider, &["A.NS"]);

        let quote = scanner.compute_signal("A.NS").await.unwrap();
        assert_eq!(quote.rvol, Decimal::ONE);
        assert_eq!(quote.price_change_pct, Decimal::ZERO);
        assert_eq!(quote.current_price, dec!(2500));
    }

    #[tokio::test]
    async fn test_zero_baseline_volume_gives_rvol_zero() {
        let provider = Arc::new(MockBarProvider::new());
        provider.set_flat_series("A.NS", 91, dec!(100), 0).await;
        let scanner = scanner_over(provider, &["A.NS"]);

        let quote = scanner.compute_signal("A.NS").await.unwrap();
        assert_eq!(quote.rvol, Decimal::ZERO, "zero baseline must not divide");
    }

    #[tokio::test]
    async fn test_rvol_with_volume_spike() {
        // 81 bars at 1700, 10 bars at 10800:
        // recent avg = 10800, baseline avg = (81*1700 + 10*10800)/91 = 2700
        let provider = Arc::new(MockBarProvider::new());
        provider
            .set_bars("A.NS", volume_profile(1700, 10_800, dec!(100), dec!(100)))
            .await;
        let scanner = scanner_over(provider, &["A.NS"]);

        let quote = scanner.compute_signal("A.NS").await.unwrap();
        assert_eq!(quote.rvol, dec!(4));
    }

    #[tokio::test]
    async fn test_price_change_from_previous_close() {
        let provider = Arc::new(MockBarProvider::new());
        provider
            .set_bars("A.NS", volume_profile(100, 100, dec!(100), dec!(102)))
            .await;
        let scanner = scanner_over(provider, &["A.NS"]);

        let quote = scanner.compute_signal("A.NS").await.unwrap();
        assert_eq!(quote.price_change_pct, dec!(2));
        assert_eq!(quote.current_price, dec!(102));
    }

    #[tokio::test]
    async fn test_insufficient_history_is_rejected() {
        let provider = Arc::new(MockBarProvider::new());
        provider.set_flat_series("A.NS", 90, dec!(100), 1000).await;
        let scanner = scanner_over(provider, &["A.NS"]);

        let err = scanner.compute_signal("A.NS").await.unwrap_err();
        match err {
            SignalError::InsufficientHistory {
                required, actual, ..
            } => {
                assert_eq!(required, 91);
                assert_eq!(actual, 90);
            }
            other => panic!("expected InsufficientHistory, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_two_bar_minimum_survives_relaxed_baseline() {
        let provider = Arc::new(MockBarProvider::new());
        provider.set_flat_series("A.NS", 1, dec!(100), 1000).await;

        let config = ScannerConfig {
            recent_window: 1,
            baseline_window: 1,
            ..test_config(&["A.NS"])
        };
        let scanner = RvolScanner::new(provider, config);

        // Even a 1-bar baseline cannot produce a previous close.
        let err = scanner.compute_signal("A.NS").await.unwrap_err();
        assert!(matches!(
            err,
            SignalError::InsufficientHistory { required: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_non_positive_close_is_unusable() {
        let provider = Arc::new(MockBarProvider::new());
        provider
            .set_bars("A.NS", volume_profile(100, 100, Decimal::ZERO, dec!(100)))
            .await;
        let scanner = scanner_over(provider, &["A.NS"]);

        let err = scanner.compute_signal("A.NS").await.unwrap_err();
        assert!(matches!(err, SignalError::BadBarData { .. }));
    }

    // =========================================================================
    // Classification Tests
    // =========================================================================

    #[tokio::test]
    async fn test_gem_requires_rvol_strictly_above_threshold() {
        let provider = Arc::new(MockBarProvider::new());
        let scanner = scanner_over(provider, &["A.NS"]);

        assert!(!scanner.classify(quote_with(dec!(2.0), dec!(0))).is_gem);
        assert!(scanner.classify(quote_with(dec!(2.01), dec!(0))).is_gem);
    }

    #[tokio::test]
    async fn test_gem_price_band_bounds_are_inclusive() {
        let provider = Arc::new(MockBarProvider::new());
        let scanner = scanner_over(provider, &["A.NS"]);

        assert!(scanner.classify(quote_with(dec!(3), dec!(-1.0))).is_gem);
        assert!(scanner.classify(quote_with(dec!(3), dec!(2.0))).is_gem);
        assert!(!scanner.classify(quote_with(dec!(3), dec!(-1.01))).is_gem);
        assert!(!scanner.classify(quote_with(dec!(3), dec!(2.01))).is_gem);
    }

    // =========================================================================
    // Batch Scan Tests
    // =========================================================================

    #[tokio::test]
    async fn test_scan_ranks_gems_above_higher_rvol_non_gems() {
        let provider = Arc::new(MockBarProvider::new());
        // GEM.NS: rvol 4, price change 0 -> gem
        provider
            .set_bars("GEM.NS", volume_profile(1700, 10_800, dec!(100), dec!(100)))
            .await;
        // HOT.NS: rvol 6 but +5% move -> not a gem
        provider
            .set_bars("HOT.NS", volume_profile(31, 486, dec!(100), dec!(105)))
            .await;
        // FLAT.NS: rvol 1 -> not a gem
        provider.set_flat_series("FLAT.NS", 91, dec!(100), 1000).await;

        let scanner = scanner_over(provider, &["FLAT.NS", "HOT.NS", "GEM.NS"]);
        let results = scanner.scan().await;

        let symbols: Vec<&str> = results.iter().map(|r| r.quote.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["GEM.NS", "HOT.NS", "FLAT.NS"]);
        assert!(results[0].is_gem);
        assert!(!results[1].is_gem);
        assert_eq!(results[1].quote.rvol, dec!(6));
    }

    #[tokio::test]
    async fn test_scan_ties_keep_universe_order() {
        let provider = Arc::new(MockBarProvider::new());
        provider.set_flat_series("FIRST.NS", 91, dec!(100), 1000).await;
        provider.set_flat_series("SECOND.NS", 91, dec!(200), 1000).await;

        let scanner = scanner_over(provider, &["FIRST.NS", "SECOND.NS"]);
        let results = scanner.scan().await;

        assert_eq!(results[0].quote.symbol, "FIRST.NS");
        assert_eq!(results[1].quote.symbol, "SECOND.NS");
    }

    #[tokio::test]
    async fn test_scan_drops_failed_symbols_without_aborting() {
        let provider = Arc::new(MockBarProvider::new());
        provider.set_flat_series("SHORT.NS", 42, dec!(100), 1000).await;
        provider.set_flat_series("OK.NS", 91, dec!(100), 1000).await;
        // MISSING.NS never seeded -> provider failure

        let scanner = scanner_over(provider, &["SHORT.NS", "MISSING.NS", "OK.NS"]);
        let results = scanner.scan().await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].quote.symbol, "OK.NS");
    }

    #[tokio::test]
    async fn test_top_n_truncates_and_tolerates_short_results() {
        let provider = Arc::new(MockBarProvider::new());
        provider.set_flat_series("A.NS", 91, dec!(100), 1000).await;
        provider.set_flat_series("B.NS", 91, dec!(100), 1000).await;
        provider.set_flat_series("C.NS", 91, dec!(100), 1000).await;

        let scanner = scanner_over(provider, &["A.NS", "B.NS", "C.NS"]);
        assert_eq!(scanner.top_n(2).await.len(), 2);
        assert_eq!(scanner.top_n(10).await.len(), 3);
    }

    // =========================================================================
    // Timeout Tests
    // =========================================================================

    struct SlowProvider {
        inner: MockBarProvider,
        slow_symbol: String,
    }

    #[async_trait]
    impl BarProvider for SlowProvider {
        async fn daily_bars(
            &self,
            symbol: &str,
            lookback_days: u32,
        ) -> Result<Vec<Bar>, ProviderError> {
            if symbol == self.slow_symbol {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.inner.daily_bars(symbol, lookback_days).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_symbol_is_dropped_not_fatal() {
        let inner = MockBarProvider::new();
        inner.set_flat_series("SLOW.NS", 91, dec!(100), 1000).await;
        inner.set_flat_series("FAST.NS", 91, dec!(100), 1000).await;

        let provider = Arc::new(SlowProvider {
            inner,
            slow_symbol: "SLOW.NS".to_string(),
        });
        let config = test_config(&["SLOW.NS", "FAST.NS"]);
        let scanner = RvolScanner::new(provider, config);

        let results = scanner.scan().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].quote.symbol, "FAST.NS");
    }
}
