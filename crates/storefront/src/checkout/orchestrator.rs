//! Checkout orchestration.

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use tradepost_core::{
    AccountType, AddressDetails, CartItem, CheckoutDetails, CheckoutState, CustomerId,
    CustomerProfile, OrderCode, PaymentSession,
};

use super::order::OrderDraft;
use super::retry::RetryPolicy;
use super::saga::{CommitReceipt, CommitSaga, SagaLog};
use super::validate::{CheckoutRequest, validate};
use super::CheckoutError;
use crate::api::OrderApi;
use crate::cart::CartStore;
use crate::delivery::DeliveryResolver;
use crate::payment::{
    GatewayError, PaymentGateway, PaymentMessage, PaymentOutcome, PaymentRequest, WatchConfig,
    WatchHandle, Watcher,
};
use crate::storage::{LocalStore, StorageError, keys};

/// Customer id recorded for orders placed without a profile.
const GUEST_CUSTOMER_ID: &str = "guest";

/// Result of placing an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// The order was committed.
    Committed(CommitReceipt),
    /// The customer must pay on the hosted page; the order commits once the
    /// payment is confirmed.
    AwaitingPayment(PaymentSession),
}

/// Drives a checkout from the cart to a committed order.
pub struct Checkout<A, G> {
    store: LocalStore,
    cart: CartStore,
    delivery: DeliveryResolver,
    api: A,
    gateway: Option<G>,
    retry: RetryPolicy,
    watch: WatchConfig,
    state: watch::Sender<CheckoutState>,
}

impl<A: OrderApi, G: PaymentGateway> Checkout<A, G> {
    /// Create an orchestrator. Without a gateway, electronic payments fail
    /// with `GatewayError::NotConfigured`.
    #[must_use]
    pub fn new(store: LocalStore, delivery: DeliveryResolver, api: A, gateway: Option<G>) -> Self {
        let (state, _) = watch::channel(CheckoutState::Idle);
        Self {
            cart: CartStore::new(store.clone()),
            store,
            delivery,
            api,
            gateway,
            retry: RetryPolicy::default(),
            watch: WatchConfig::default(),
            state,
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_watch_config(mut self, watch: WatchConfig) -> Self {
        self.watch = watch;
        self
    }

    #[must_use]
    pub const fn cart(&self) -> &CartStore {
        &self.cart
    }

    #[must_use]
    pub fn state(&self) -> CheckoutState {
        *self.state.borrow()
    }

    /// Observe state changes, e.g. to drive a progress indicator.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<CheckoutState> {
        self.state.subscribe()
    }

    /// Validate the cart and form, then either commit the order or start a
    /// hosted payment.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart` or `Validation` before any network call,
    /// `Gateway` if the payment cannot be started, and the commit errors of
    /// [`Checkout::resume_commit`].
    #[instrument(skip(self, request), fields(payment = ?request.payment_method))]
    pub async fn place_order(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        self.set_state(CheckoutState::Validating);

        let items = self.cart.items();
        if items.is_empty() {
            self.set_state(CheckoutState::Invalid);
            return Err(CheckoutError::EmptyCart);
        }

        let profile = self.profile();
        let delivery = self.delivery.current(profile.as_ref());
        let validated = match validate(&request, profile.as_ref(), delivery.as_ref()) {
            Ok(validated) => validated,
            Err(e) => {
                self.set_state(CheckoutState::Invalid);
                return Err(e.into());
            }
        };
        self.set_state(CheckoutState::Ready);

        self.set_state(CheckoutState::Submitting);
        let account_type = profile
            .as_ref()
            .map_or(AccountType::Customer, |p| p.account_type);
        let customer_id = profile
            .as_ref()
            .map_or_else(|| CustomerId::new(GUEST_CUSTOMER_ID), |p| p.customer_id.clone());

        let cart_id = self.cart.cart_id().inspect_err(|_| self.set_state(CheckoutState::Failed))?;
        let (checkout, address) = OrderDraft {
            cart_id,
            customer_id,
            account_type,
            items: &items,
            request: &request,
            validated: &validated,
        }
        .build();
        info!(order_code = %checkout.order_code, total = %checkout.total_amount, "Order prepared");

        if account_type.is_agent() || !validated.payment_method.is_electronic() {
            self.set_state(CheckoutState::DirectCommit);
            let result = self.commit(SagaLog::new(checkout, address)).await;
            return result.map(CheckoutOutcome::Committed);
        }

        self.set_state(CheckoutState::AwaitingPayment);
        match self.begin_payment(checkout, address, &items).await {
            Ok(session) => Ok(CheckoutOutcome::AwaitingPayment(session)),
            Err(e) => {
                // Nothing was placed; the customer can start over
                if let Err(clear) = self.clear_pending() {
                    warn!(error = %clear, "Failed to clear pending checkout");
                }
                self.set_state(CheckoutState::Idle);
                Err(e)
            }
        }
    }

    /// Start watching for confirmation of `order_code`.
    #[must_use]
    pub fn watch_payment(
        &self,
        order_code: OrderCode,
        messages: broadcast::Receiver<PaymentMessage>,
    ) -> WatchHandle {
        Watcher::new(self.api.clone(), self.watch.clone()).start_watching(order_code, messages)
    }

    /// Act on the outcome of a payment watch.
    ///
    /// Success commits the pending order. Cancellation, failure and timeout
    /// discard it. A closed watch keeps it so it can be resumed.
    ///
    /// # Errors
    ///
    /// Returns the commit errors on success, and the matching `Payment*`
    /// error otherwise.
    #[instrument(skip(self, order_code), fields(order_code = %order_code))]
    pub async fn complete_payment(
        &self,
        order_code: &OrderCode,
        outcome: PaymentOutcome,
    ) -> Result<CommitReceipt, CheckoutError> {
        let error = match outcome {
            PaymentOutcome::Succeeded => return self.commit_pending(order_code).await,
            PaymentOutcome::Closed => {
                self.set_state(CheckoutState::Idle);
                return Err(CheckoutError::PaymentClosed(order_code.clone()));
            }
            PaymentOutcome::Cancelled => CheckoutError::PaymentCancelled(order_code.clone()),
            PaymentOutcome::Failed => CheckoutError::PaymentFailed(order_code.clone()),
            PaymentOutcome::TimedOut => CheckoutError::PaymentTimedOut(order_code.clone()),
        };

        warn!(?outcome, "Payment not completed");
        self.clear_pending()?;
        self.set_state(CheckoutState::Idle);
        Err(error)
    }

    /// Watch `order_code` until it settles, then act on the outcome.
    ///
    /// # Errors
    ///
    /// See [`Checkout::complete_payment`].
    pub async fn confirm_payment(
        &self,
        order_code: &OrderCode,
        messages: broadcast::Receiver<PaymentMessage>,
    ) -> Result<CommitReceipt, CheckoutError> {
        let outcome = self
            .watch_payment(order_code.clone(), messages)
            .outcome()
            .await;
        self.complete_payment(order_code, outcome).await
    }

    /// Order code of a payment still awaiting confirmation, e.g. after a
    /// restart.
    #[must_use]
    pub fn resume_pending(&self) -> Option<OrderCode> {
        self.store
            .get::<OrderCode>(keys::PENDING_ORDER_ID)
            .filter(|code| !code.is_empty())
    }

    /// Order code of a commit that did not finish.
    #[must_use]
    pub fn interrupted_commit(&self) -> Option<OrderCode> {
        SagaLog::load(&self.store).map(|log| log.order_code().clone())
    }

    /// Finish an interrupted commit, submitting only the steps not yet done.
    ///
    /// # Errors
    ///
    /// Returns `NothingToResume` if no commit is in progress, `CheckoutFailed`
    /// if the checkout step exhausts its retries and `PartialCommit` if the
    /// address step does.
    pub async fn resume_commit(&self) -> Result<CommitReceipt, CheckoutError> {
        let log = SagaLog::load(&self.store).ok_or(CheckoutError::NothingToResume)?;
        info!(order_code = %log.order_code(), "Resuming order commit");
        self.set_state(CheckoutState::DirectCommit);
        self.commit(log).await
    }

    async fn commit(&self, log: SagaLog) -> Result<CommitReceipt, CheckoutError> {
        let saga = CommitSaga {
            api: &self.api,
            store: &self.store,
            cart: &self.cart,
            retry: &self.retry,
        };

        let result = saga.run(log).await;
        self.set_state(if result.is_ok() {
            CheckoutState::Committed
        } else {
            CheckoutState::Failed
        });
        result
    }

    async fn commit_pending(&self, order_code: &OrderCode) -> Result<CommitReceipt, CheckoutError> {
        let checkout = self.store.get::<CheckoutDetails>(keys::PENDING_CHECKOUT);
        let address = self.store.get::<AddressDetails>(keys::PENDING_ADDRESS);

        let (Some(checkout), Some(address)) = (checkout, address) else {
            self.set_state(CheckoutState::Failed);
            return Err(CheckoutError::NoPendingPayment);
        };
        if &checkout.order_code != order_code || &address.order_code != order_code {
            self.set_state(CheckoutState::Failed);
            return Err(CheckoutError::NoPendingPayment);
        }

        info!("Payment confirmed");
        self.store.remove(keys::PENDING_ORDER_ID)?;
        self.set_state(CheckoutState::DirectCommit);
        let result = self.commit(SagaLog::new(checkout, address)).await;

        // The step log now owns the order, whatever the commit's result
        self.store.remove(keys::PENDING_CHECKOUT)?;
        self.store.remove(keys::PENDING_ADDRESS)?;
        result
    }

    async fn begin_payment(
        &self,
        checkout: CheckoutDetails,
        address: AddressDetails,
        items: &[CartItem],
    ) -> Result<PaymentSession, CheckoutError> {
        let gateway = self
            .gateway
            .as_ref()
            .ok_or(CheckoutError::Gateway(GatewayError::NotConfigured))?;

        self.store.insert(keys::PENDING_CHECKOUT, &checkout)?;
        self.store.insert(keys::PENDING_ADDRESS, &address)?;

        let request = PaymentRequest {
            total_amount: checkout.total_amount,
            description: items
                .iter()
                .map(|i| i.product_name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            order_code: checkout.order_code.clone(),
        };
        let checkout_url = gateway.initiate(&request).await?;

        self.store
            .insert(keys::PENDING_ORDER_ID, &checkout.order_code)?;
        info!(order_code = %checkout.order_code, "Awaiting payment");

        Ok(PaymentSession::pending(checkout.order_code, checkout_url))
    }

    fn clear_pending(&self) -> Result<(), StorageError> {
        self.store.remove(keys::PENDING_ORDER_ID)?;
        self.store.remove(keys::PENDING_CHECKOUT)?;
        self.store.remove(keys::PENDING_ADDRESS)
    }

    fn profile(&self) -> Option<CustomerProfile> {
        self.store.get(keys::CUSTOMER_PROFILE)
    }

    fn set_state(&self, state: CheckoutState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Checkout state");
        }
    }
}
