//! Status enums for the checkout flow.

use serde::{Deserialize, Serialize};

/// Lifecycle of a hosted payment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Succeeded,
    Cancelled,
    Failed,
}

impl PaymentStatus {
    /// Whether the session has reached an outcome.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// How the customer pays for an order.
///
/// Serialized with the labels the order API stores in `paymentMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "Cash on Delivery")]
    CashOnDelivery,
    #[serde(rename = "Pay on Pickup")]
    PayOnPickup,
    #[serde(rename = "Paid by Agent")]
    AgentPaid,
    #[serde(rename = "Mobile Money")]
    MobileMoney,
    #[serde(rename = "Credit Card")]
    CreditCard,
}

impl PaymentMethod {
    /// All methods, in the order they are offered at checkout.
    pub const ALL: [Self; 5] = [
        Self::CashOnDelivery,
        Self::PayOnPickup,
        Self::AgentPaid,
        Self::MobileMoney,
        Self::CreditCard,
    ];

    /// Methods routed through the hosted payment gateway.
    #[must_use]
    pub const fn is_electronic(&self) -> bool {
        matches!(self, Self::MobileMoney | Self::CreditCard)
    }

    /// Human-readable label, identical to the serialized form.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CashOnDelivery => "Cash on Delivery",
            Self::PayOnPickup => "Pay on Pickup",
            Self::AgentPaid => "Paid by Agent",
            Self::MobileMoney => "Mobile Money",
            Self::CreditCard => "Credit Card",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "cash on delivery" | "cod" | "cash" => Ok(Self::CashOnDelivery),
            "pay on pickup" | "pickup" => Ok(Self::PayOnPickup),
            "paid by agent" | "agent paid" | "agent" => Ok(Self::AgentPaid),
            "mobile money" | "momo" => Ok(Self::MobileMoney),
            "credit card" | "card" => Ok(Self::CreditCard),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Kind of account placing the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Regular shopper.
    #[default]
    Customer,
    /// Agent/reseller placing orders on behalf of customers.
    Agent,
}

impl AccountType {
    #[must_use]
    pub const fn is_agent(&self) -> bool {
        matches!(self, Self::Agent)
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "agent" => Ok(Self::Agent),
            _ => Err(format!("invalid account type: {s}")),
        }
    }
}

/// State of a single checkout attempt.
///
/// ```text
/// Idle -> Validating -> Invalid
///                    -> Ready -> Submitting -> DirectCommit    -> Committed | Failed
///                                           -> AwaitingPayment -> DirectCommit | Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    #[default]
    Idle,
    Validating,
    Invalid,
    Ready,
    Submitting,
    DirectCommit,
    AwaitingPayment,
    Committed,
    Failed,
}

impl CheckoutState {
    /// Whether a loading indicator should be shown.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Validating | Self::Submitting | Self::DirectCommit | Self::AwaitingPayment
        )
    }
}
