//! Decimal arithmetic utilities for financial calculations.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Safe division that returns zero if the divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Signed percentage change from `previous` to `current`.
pub fn pct_change(current: Decimal, previous: Decimal) -> Decimal {
    safe_div(current - previous, previous) * dec!(100)
}
