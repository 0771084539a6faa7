//! Remote order API.
//!
//! The storefront consumes three endpoints of the order-processing API:
//!
//! ```text
//! POST /orders/checkout           - Submit CheckoutDetails
//! POST /orders/delivery-address   - Submit AddressDetails for an order code
//! GET  /orders/{code}/status      - Payment status ("0000" paid, "2001" cancelled)
//! ```
//!
//! [`OrderApi`] is the seam the checkout orchestrator and payment watcher are
//! written against; [`OrderApiClient`] is the HTTP implementation.

mod client;

pub use client::OrderApiClient;

use std::future::Future;

use serde::Deserialize;
use thiserror::Error;

use tradepost_core::{AddressDetails, CheckoutDetails, OrderCode};

/// Status code reported for a paid order.
pub const PAID_CODE: &str = "0000";

/// Status code reported for a cancelled payment.
pub const CANCELLED_CODE: &str = "2001";

/// Errors that can occur when calling the order API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Acknowledgement returned by the write endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "orderID", alias = "id")]
    pub order_id: Option<String>,
}

/// Payment status of an order as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    Paid,
    Cancelled,
    /// Any other code; the payment has not settled yet.
    Pending(String),
}

impl OrderStatus {
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            PAID_CODE => Self::Paid,
            CANCELLED_CODE => Self::Cancelled,
            other => Self::Pending(other.to_string()),
        }
    }
}

/// The order-processing API as seen by checkout.
pub trait OrderApi: Clone + Send + Sync + 'static {
    /// Submit the order header.
    fn submit_checkout(
        &self,
        details: &CheckoutDetails,
    ) -> impl Future<Output = Result<OrderConfirmation, ApiError>> + Send;

    /// Submit the delivery address for an order already checked out.
    fn update_delivery(
        &self,
        address: &AddressDetails,
    ) -> impl Future<Output = Result<OrderConfirmation, ApiError>> + Send;

    /// Query the payment status of an order.
    fn order_status(
        &self,
        order_code: &OrderCode,
    ) -> impl Future<Output = Result<OrderStatus, ApiError>> + Send;
}
