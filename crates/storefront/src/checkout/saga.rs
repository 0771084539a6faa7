//! Two-step order commit.
//!
//! An order is placed by submitting the checkout record and then the delivery
//! address. The order API has no transaction spanning both calls, so progress
//! is written to a step log before and after each step. If the address step
//! exhausts its retries the order exists server-side without an address; the
//! log keeps the order code and lets a later `resume` retry only that step.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use tradepost_core::{AddressDetails, CheckoutDetails, OrderCode};

use super::CheckoutError;
use super::retry::{RetryPolicy, with_retry};
use crate::api::{OrderApi, OrderConfirmation};
use crate::cart::CartStore;
use crate::storage::{LocalStore, StorageError, keys};

/// A step of the order commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStep {
    Checkout,
    DeliveryAddress,
}

impl fmt::Display for CommitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checkout => write!(f, "checkout"),
            Self::DeliveryAddress => write!(f, "delivery address"),
        }
    }
}

/// Persisted progress of an order commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaLog {
    pub checkout: CheckoutDetails,
    pub address: AddressDetails,
    #[serde(default)]
    pub checkout_submitted: bool,
    #[serde(default)]
    pub address_submitted: bool,
}

impl SagaLog {
    #[must_use]
    pub const fn new(checkout: CheckoutDetails, address: AddressDetails) -> Self {
        Self {
            checkout,
            address,
            checkout_submitted: false,
            address_submitted: false,
        }
    }

    #[must_use]
    pub const fn order_code(&self) -> &OrderCode {
        &self.checkout.order_code
    }

    /// Load the log of an interrupted commit, if any.
    #[must_use]
    pub fn load(store: &LocalStore) -> Option<Self> {
        store.get(keys::CHECKOUT_SAGA)
    }

    fn save(&self, store: &LocalStore) -> Result<(), StorageError> {
        store.insert(keys::CHECKOUT_SAGA, self)
    }
}

/// A committed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub order_code: OrderCode,
    pub total_amount: Decimal,
    /// Acknowledgement from the delivery-address step.
    pub confirmation: OrderConfirmation,
}

/// Runs a [`SagaLog`] to completion.
pub(crate) struct CommitSaga<'a, A> {
    pub api: &'a A,
    pub store: &'a LocalStore,
    pub cart: &'a CartStore,
    pub retry: &'a RetryPolicy,
}

impl<A: OrderApi> CommitSaga<'_, A> {
    /// Submit whatever steps of `log` are not done yet, then clear the cart.
    ///
    /// Address submission is only issued once checkout has been accepted.
    #[instrument(skip(self, log), fields(order_code = %log.order_code()))]
    pub async fn run(&self, mut log: SagaLog) -> Result<CommitReceipt, CheckoutError> {
        log.save(self.store)?;

        if !log.checkout_submitted {
            with_retry(self.retry, "submit_checkout", || {
                self.api.submit_checkout(&log.checkout)
            })
            .await
            .map_err(|e| {
                // Nothing was placed; the log has no further use
                if let Err(clear) = self.store.remove(keys::CHECKOUT_SAGA) {
                    warn!(error = %clear, "Failed to discard step log of unplaced order");
                }
                CheckoutError::CheckoutFailed {
                    step: CommitStep::Checkout,
                    attempts: e.attempts,
                    message: e.last_error.to_string(),
                }
            })?;

            log.checkout_submitted = true;
            log.save(self.store)?;
            info!("Checkout accepted");
        }

        let confirmation = if log.address_submitted {
            OrderConfirmation::default()
        } else {
            let confirmation = with_retry(self.retry, "update_delivery", || {
                self.api.update_delivery(&log.address)
            })
            .await
            .map_err(|e| CheckoutError::PartialCommit {
                order_code: log.order_code().clone(),
                attempts: e.attempts,
                message: e.last_error.to_string(),
            })?;

            log.address_submitted = true;
            log.save(self.store)?;
            confirmation
        };

        self.cart.clear()?;
        self.store.remove(keys::CHECKOUT_SAGA)?;
        info!(total = %log.checkout.total_amount, "Order committed");

        Ok(CommitReceipt {
            order_code: log.checkout.order_code,
            total_amount: log.checkout.total_amount,
            confirmation,
        })
    }
}
