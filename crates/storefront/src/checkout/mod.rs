//! Checkout.
//!
//! Turns the cart and delivery selection into an order on the order API:
//!
//! ```text
//! Idle -> Validating -> Invalid
//!                    -> Ready -> Submitting -> DirectCommit    -> Committed | Failed
//!                                           -> AwaitingPayment -> (watch) -> DirectCommit
//! ```
//!
//! Agent accounts and cash/pickup payments commit straight away. Electronic
//! payments go through the hosted checkout first and commit once the
//! [`crate::payment::Watcher`] reports success.

mod order;
mod orchestrator;
mod retry;
mod saga;
mod validate;

pub use order::{OrderDraft, calculate_total, generate_order_code};
pub use orchestrator::{Checkout, CheckoutOutcome};
pub use retry::{RetryExhausted, RetryPolicy, with_retry};
pub use saga::{CommitReceipt, CommitStep, SagaLog};
pub use validate::{
    CheckoutRequest, FALLBACK_CONTACT_NUMBER, Recipient, ValidatedCheckout, resolve_recipient,
    validate,
};

use std::fmt;

use thiserror::Error;

use tradepost_core::OrderCode;

use crate::delivery::DeliveryError;
use crate::payment::GatewayError;
use crate::storage::StorageError;

/// A checkout form field that must be filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Address,
    PaymentMethod,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => write!(f, "delivery address"),
            Self::PaymentMethod => write!(f, "payment method"),
        }
    }
}

/// Fields missing from a checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing required fields: {}", join_fields(.missing))]
pub struct ValidationError {
    pub missing: Vec<Field>,
}

fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Your cart is empty")]
    EmptyCart,

    /// The order API rejected a step on every attempt.
    #[error("Checkout failed at {step} after {attempts} attempts: {message}")]
    CheckoutFailed {
        step: CommitStep,
        attempts: u32,
        message: String,
    },

    /// The order was placed but its delivery address was not saved.
    #[error(
        "Order {order_code} was placed but its delivery address could not be saved after {attempts} attempts: {message}"
    )]
    PartialCommit {
        order_code: OrderCode,
        attempts: u32,
        message: String,
    },

    #[error("Payment could not be started: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Payment for order {0} was cancelled")]
    PaymentCancelled(OrderCode),

    #[error("Payment for order {0} failed")]
    PaymentFailed(OrderCode),

    #[error("Timed out waiting for payment of order {0}")]
    PaymentTimedOut(OrderCode),

    #[error("Stopped waiting for payment of order {0}; it can be resumed later")]
    PaymentClosed(OrderCode),

    #[error("No payment is awaiting confirmation")]
    NoPendingPayment,

    #[error("No interrupted order to resume")]
    NothingToResume,

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
