//! Type-safe price representation using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., cedis, not pesewas).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price in Ghana cedis.
    #[must_use]
    pub const fn cedis(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::GHS)
    }

    /// Format for display, e.g. `₵12.5`.
    ///
    /// Trailing zeros are dropped so whole amounts render as `₵20`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{}", self.currency_code.symbol(), self.amount.normalize())
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    GHS,
    USD,
}

impl CurrencyCode {
    /// Currency symbol used in fee and total displays.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::GHS => "₵",
            Self::USD => "$",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_drops_trailing_zeros() {
        assert_eq!(Price::cedis(Decimal::new(2000, 2)).display(), "₵20");
        assert_eq!(Price::cedis(Decimal::new(125, 1)).display(), "₵12.5");
    }

    #[test]
    fn test_default_currency_is_cedi() {
        assert_eq!(CurrencyCode::default(), CurrencyCode::GHS);
        assert_eq!(CurrencyCode::USD.symbol(), "$");
    }
}
