//! Hosted payment.
//!
//! Electronic payments are taken on the provider's hosted checkout page. The
//! storefront initiates a session through a [`PaymentGateway`], hands the
//! customer the returned URL, and then waits for confirmation: either a
//! [`PaymentMessage`] relayed by the listener routes or the order API's status
//! endpoint, whichever reports first (see [`Watcher`]).

mod hubtel;
mod messages;
mod watcher;

pub use hubtel::HubtelGateway;
pub use messages::{MessageKind, PaymentMessage, PaymentMessageHub, is_trusted_origin};
pub use watcher::{PaymentOutcome, WatchConfig, WatchHandle, Watcher};

use std::future::Future;

use rust_decimal::Decimal;
use thiserror::Error;

use tradepost_core::OrderCode;

/// Errors that can occur when initiating a payment.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No gateway credentials are configured.
    #[error("Electronic payments are not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider declined the request.
    #[error("Payment provider rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The provider answered without a usable checkout URL.
    #[error("Unexpected payment provider response: {body}")]
    Malformed { body: String },

    /// A callback URL could not be built.
    #[error("Invalid callback URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A hosted payment session request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub total_amount: Decimal,
    /// Shown to the customer on the hosted page.
    pub description: String,
    /// Sent as the client reference and echoed back in callbacks.
    pub order_code: OrderCode,
}

/// A hosted-checkout payment provider.
pub trait PaymentGateway: Send + Sync {
    /// Start a payment session and return the hosted checkout URL.
    fn initiate(
        &self,
        request: &PaymentRequest,
    ) -> impl Future<Output = Result<String, GatewayError>> + Send;
}
