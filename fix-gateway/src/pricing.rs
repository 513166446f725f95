//! USD/BRL currency conversion.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("Unsupported symbol: {0}. Use USD/BRL or BRL/USD")]
    UnsupportedSymbol(String),

    #[error("Amount must be positive")]
    NonPositiveAmount,

    #[error("Conversion rate must be positive")]
    NonPositiveRate,

    #[error("Amount {0} is too large to convert")]
    Overflow(Decimal),
}

/// Convert `amount` using the USD/BRL `rate` (BRL per USD).
///
/// `USD/BRL` converts dollars into reais, `BRL/USD` reais into dollars.
/// The result is rounded to cents.
pub fn calculate_price(symbol: &str, amount: Decimal, rate: Decimal) -> Result<Decimal, PricingError> {
    if amount <= Decimal::ZERO {
        return Err(PricingError::NonPositiveAmount);
    }
    if rate <= Decimal::ZERO {
        return Err(PricingError::NonPositiveRate);
    }

    let converted = match symbol.trim() {
        "USD/BRL" => amount.checked_mul(rate),
        "BRL/USD" => amount.checked_div(rate),
        other => return Err(PricingError::UnsupportedSymbol(other.to_string())),
    };
    converted
        .map(|price| price.round_dp(2))
        .ok_or(PricingError::Overflow(amount))
}
