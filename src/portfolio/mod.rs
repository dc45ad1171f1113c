//! Paper-trading portfolio ledger.
//!
//! Executes buy/sell instructions against fresh scanner quotes and keeps
//! cash, cost-basis holdings, and an append-only order history. State lives
//! behind a single writer lock: each trade's read-modify-write of cash and
//! holdings is atomic, and readers never observe a half-applied trade.
//! Nothing survives a restart; this is simulation money.

use crate::config::PortfolioConfig;
use crate::scanner::{Quote, RvolScanner};
use crate::utils::decimal::pct_change;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Trade and quote failures. Caller input errors carry the violated
/// constraint; none of them mutate state.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("symbol {symbol} not found")]
    SymbolNotFound { symbol: String },

    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("insufficient shares of {symbol}: requested {requested}, holding {held}")]
    InsufficientShares {
        symbol: String,
        requested: u32,
        held: u32,
    },

    #[error("invalid action '{0}', expected 'buy' or 'sell'")]
    InvalidAction(String),

    #[error("quantity must be greater than zero")]
    InvalidQuantity,
}

/// Side of a trade instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl FromStr for TradeAction {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self, TradeError> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(TradeError::InvalidAction(other.to_string())),
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Every fill is atomic and immediate; there is no partial or pending state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Completed,
}

/// Immutable audit record of one executed trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    /// 1-based, strictly increasing, equal to the order count at append time
    pub id: u64,
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: u32,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub status: OrderStatus,
}

/// Currently owned shares of one symbol. Exists only while `quantity > 0`;
/// `avg_price` is the volume-weighted acquisition cost, untouched by sells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub quantity: u32,
    pub avg_price: Decimal,
}

#[derive(Debug, Clone)]
struct PortfolioState {
    cash: Decimal,
    holdings: HashMap<String, Holding>,
    orders: Vec<Order>,
}

/// One holding valued at the current market price.
#[derive(Debug, Clone, Serialize)]
pub struct HoldingView {
    pub symbol: String,
    pub quantity: u32,
    pub avg_price: Decimal,
    pub current_price: Decimal,
    pub current_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
}

/// Point-in-time valuation of the whole portfolio.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioView {
    pub cash: Decimal,
    pub total_value: Decimal,
    /// Portion of total value deployed in holdings rather than held as cash
    pub used_margin: Decimal,
    pub holdings: Vec<HoldingView>,
    pub orders: Vec<Order>,
}

/// The paper portfolio ledger. Prices are re-derived through the scanner on
/// every trade and snapshot; there is deliberately no quote cache, so a
/// stale price can never fill a simulated order.
pub struct PaperPortfolio {
    scanner: Arc<RvolScanner>,
    state: Arc<RwLock<PortfolioState>>,
}

impl PaperPortfolio {
    /// Create a ledger with the configured starting cash and no holdings.
    pub fn new(scanner: Arc<RvolScanner>, config: &PortfolioConfig) -> Self {
        Self {
            scanner,
            state: Arc::new(RwLock::new(PortfolioState {
                cash: config.starting_cash,
                holdings: HashMap::new(),
                orders: Vec::new(),
            })),
        }
    }

    /// Resolve a fresh quote for a tradeable symbol. The scanner's
    /// per-symbol data failures all collapse to "not found" here: the
    /// ledger's callers reason about tradeability, not history depth.
    pub async fn quote(&self, symbol: &str) -> Result<Quote, TradeError> {
        self.scanner.compute_signal(symbol).await.map_err(|err| {
            debug!(%symbol, error = %err, "Quote resolution failed");
            TradeError::SymbolNotFound {
                symbol: symbol.to_string(),
            }
        })
    }

    /// Execute a buy or sell at the current market price.
    ///
    /// Validation and mutation run under one write guard; a rejected trade
    /// leaves cash, holdings, and the order log exactly as they were.
    pub async fn execute_trade(
        &self,
        symbol: &str,
        action: TradeAction,
        quantity: u32,
    ) -> Result<Order, TradeError> {
        if quantity == 0 {
            return Err(TradeError::InvalidQuantity);
        }

        let quote = self.quote(symbol).await?;
        let price = quote.current_price;
        let notional = price * Decimal::from(quantity);

        let mut state = self.state.write().await;
        match action {
            TradeAction::Buy => {
                if notional > state.cash {
                    return Err(TradeError::InsufficientFunds {
                        required: notional,
                        available: state.cash,
                    });
                }
                match state.holdings.entry(symbol.to_string()) {
                    Entry::Occupied(mut entry) => {
                        let holding = entry.get_mut();
                        let combined = holding.quantity + quantity;
                        holding.avg_price = (holding.avg_price * Decimal::from(holding.quantity)
                            + notional)
                            / Decimal::from(combined);
                        holding.quantity = combined;
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(Holding {
                            quantity,
                            avg_price: price,
                        });
                    }
                }
                state.cash -= notional;
            }
            TradeAction::Sell => {
                let held = state
                    .holdings
                    .get(symbol)
                    .map(|h| h.quantity)
                    .unwrap_or(0);
                if held < quantity {
                    return Err(TradeError::InsufficientShares {
                        symbol: symbol.to_string(),
                        requested: quantity,
                        held,
                    });
                }
                let remaining = held - quantity;
                if remaining == 0 {
                    // No zero-quantity entries persist.
                    state.holdings.remove(symbol);
                } else if let Some(holding) = state.holdings.get_mut(symbol) {
                    holding.quantity = remaining;
                }
                // Proceeds at the current market price, not cost basis;
                // realized P&L stays derivable from the cash delta.
                state.cash += notional;
            }
        }

        let order = Order {
            id: state.orders.len() as u64 + 1,
            symbol: symbol.to_string(),
            action,
            quantity,
            price,
            timestamp: Utc::now(),
            status: OrderStatus::Completed,
        };
        state.orders.push(order.clone());

        info!(
            order_id = order.id,
            %symbol,
            action = %action,
            quantity,
            price = %price,
            cash = %state.cash,
            "Paper order executed"
        );

        Ok(order)
    }

    /// Value the portfolio at current market prices.
    ///
    /// Holdings whose symbol cannot be re-quoted are skipped from the view;
    /// their value stays invisible until data returns.
    pub async fn snapshot(&self) -> PortfolioView {
        let (cash, holdings, orders) = {
            let state = self.state.read().await;
            (state.cash, state.holdings.clone(), state.orders.clone())
        };

        let mut entries: Vec<(String, Holding)> = holdings.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut views = Vec::with_capacity(entries.len());
        let mut total_value = cash;
        for (symbol, holding) in entries {
            let quote = match self.quote(&symbol).await {
                Ok(quote) => quote,
                Err(err) => {
                    warn!(%symbol, error = %err, "Holding skipped from snapshot");
                    continue;
                }
            };
            let qty = Decimal::from(holding.quantity);
            let current_value = quote.current_price * qty;
            total_value += current_value;
            views.push(HoldingView {
                symbol,
                quantity: holding.quantity,
                avg_price: holding.avg_price,
                current_price: quote.current_price,
                current_value,
                pnl: (quote.current_price - holding.avg_price) * qty,
                pnl_percent: pct_change(quote.current_price, holding.avg_price),
            });
        }

        PortfolioView {
            cash,
            total_value,
            used_margin: total_value - cash,
            holdings: views,
            orders,
        }
    }
}
