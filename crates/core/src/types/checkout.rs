//! Records exchanged with the order API during checkout.
//!
//! [`CheckoutDetails`] and [`AddressDetails`] are built once per checkout
//! attempt and paired through their `order_code`. Both must be accepted by the
//! order API before an order counts as placed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartId, CustomerId, OrderCode};
use super::status::{AccountType, PaymentMethod, PaymentStatus};

/// Order header submitted to the order-checkout endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDetails {
    pub cart_id: CartId,
    pub customer_id: CustomerId,
    pub order_code: OrderCode,
    pub payment_mode: PaymentMethod,
    #[serde(default)]
    pub payment_account_number: Option<String>,
    pub customer_account_type: AccountType,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub recipient_name: String,
    pub recipient_contact_number: String,
    #[serde(default)]
    pub order_note: String,
    pub order_date: DateTime<Utc>,
}

/// Delivery address submitted to the delivery-update endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDetails {
    pub order_code: OrderCode,
    pub address: String,
    pub customer_id: CustomerId,
    pub recipient_name: String,
    pub recipient_contact_number: String,
    #[serde(default)]
    pub order_note: String,
    #[serde(default)]
    pub geo_location: Option<String>,
}

/// Locally stored customer profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub customer_id: CustomerId,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub account_type: AccountType,
}

/// A hosted payment session awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    /// Order code, also sent to the provider as the client reference.
    pub order_id: OrderCode,
    pub checkout_url: String,
    pub status: PaymentStatus,
}

impl PaymentSession {
    #[must_use]
    pub fn pending(order_id: OrderCode, checkout_url: impl Into<String>) -> Self {
        Self {
            order_id,
            checkout_url: checkout_url.into(),
            status: PaymentStatus::Pending,
        }
    }

    /// Record how the session ended. The first terminal status sticks.
    ///
    /// Returns `false` if the session had already settled.
    pub fn settle(&mut self, status: PaymentStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }
}
