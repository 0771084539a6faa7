//! Delivery selection and fee derivation.
//!
//! A delivery selection comes from exactly one source: the region/town fee
//! table, free-text manual entry by a customer, or an address and fee typed in
//! by an agent. Each source is its own variant so a manual selection can never
//! carry a stale region/town pair.
//!
//! Fee display rules:
//!
//! | fee                      | display          |
//! |--------------------------|------------------|
//! | `"Free delivery"`        | `Free delivery`  |
//! | `0`                      | `N/A`            |
//! | `n > 0`                  | `₵{n}`           |

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::price::Price;

/// Sentinel used by the fee table for towns with free delivery.
pub const FREE_DELIVERY: &str = "Free delivery";

/// Display used when no fee applies.
const NOT_APPLICABLE: &str = "N/A";

/// A delivery fee as stored in the region/town table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFee {
    /// The `"Free delivery"` sentinel.
    Free,
    /// A fixed fee in cedis, never negative.
    Amount(Decimal),
}

impl TableFee {
    /// Numeric fee used in totals. Free delivery counts as zero.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        match self {
            Self::Free => Decimal::ZERO,
            Self::Amount(amount) => *amount,
        }
    }

    /// Fee label shown next to the address.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Free => FREE_DELIVERY.to_string(),
            Self::Amount(amount) => display_amount(*amount),
        }
    }
}

fn display_amount(amount: Decimal) -> String {
    if amount.is_zero() {
        NOT_APPLICABLE.to_string()
    } else {
        Price::cedis(amount).display()
    }
}

impl Serialize for TableFee {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Free => serializer.serialize_str(FREE_DELIVERY),
            Self::Amount(amount) => rust_decimal::serde::float::serialize(amount, serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TableFee {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawFee {
            Amount(Decimal),
            Text(String),
        }

        match RawFee::deserialize(deserializer)? {
            RawFee::Amount(amount) if amount.is_sign_negative() && !amount.is_zero() => Err(
                serde::de::Error::custom(format!("delivery fee must not be negative: {amount}")),
            ),
            RawFee::Amount(amount) => Ok(Self::Amount(amount)),
            RawFee::Text(text) if text.trim().eq_ignore_ascii_case(FREE_DELIVERY) => Ok(Self::Free),
            RawFee::Text(text) => Err(serde::de::Error::custom(format!(
                "invalid delivery fee: {text}"
            ))),
        }
    }
}

/// The current delivery selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DeliveryInfo {
    /// Picked from the region/town fee table.
    RegionTown {
        region: String,
        town: String,
        fee: TableFee,
    },
    /// Free-text address, fee settled outside the checkout.
    Manual { address: String },
    /// Address and fee entered by an agent.
    AgentManual { address: String, fee: Decimal },
}

impl DeliveryInfo {
    /// Recipient address; `"<town> (<region>)"` for table selections.
    #[must_use]
    pub fn address(&self) -> String {
        match self {
            Self::RegionTown { region, town, .. } => format!("{town} ({region})"),
            Self::Manual { address } | Self::AgentManual { address, .. } => address.clone(),
        }
    }

    /// Numeric fee used in totals.
    #[must_use]
    pub const fn fee(&self) -> Decimal {
        match self {
            Self::RegionTown { fee, .. } => fee.amount(),
            Self::Manual { .. } => Decimal::ZERO,
            Self::AgentManual { fee, .. } => *fee,
        }
    }

    /// Fee label: `Free delivery`, `N/A`, or `₵<amount>`.
    #[must_use]
    pub fn fee_display(&self) -> String {
        match self {
            Self::RegionTown { fee, .. } => fee.display(),
            Self::Manual { .. } => NOT_APPLICABLE.to_string(),
            Self::AgentManual { fee, .. } => display_amount(*fee),
        }
    }

    #[must_use]
    pub const fn is_manual(&self) -> bool {
        !matches!(self, Self::RegionTown { .. })
    }
}
