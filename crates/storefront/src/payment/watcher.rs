//! Payment confirmation watcher.
//!
//! After the customer is sent to the hosted checkout page, the watcher polls
//! the order API's status endpoint and listens for messages relayed from the
//! provider, racing both against a maximum wait and cancellation in one
//! spawned task.
//!
//! Relayed messages arrive over unauthenticated routes, so they only prompt
//! an immediate status check. A payment counts as made only when the status
//! endpoint reports it paid.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tradepost_core::{OrderCode, PaymentStatus};

use super::messages::{MessageKind, PaymentMessage, is_trusted_origin};
use crate::api::{ApiError, OrderApi, OrderStatus};

/// How a watch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded,
    Cancelled,
    Failed,
    /// The maximum wait elapsed without a final answer.
    TimedOut,
    /// The watch was cancelled or its handle dropped.
    Closed,
}

impl PaymentOutcome {
    /// Status to record on the payment session.
    ///
    /// A closed watch leaves the session pending; a timed-out one has failed.
    #[must_use]
    pub const fn status(self) -> PaymentStatus {
        match self {
            Self::Succeeded => PaymentStatus::Succeeded,
            Self::Cancelled => PaymentStatus::Cancelled,
            Self::Failed | Self::TimedOut => PaymentStatus::Failed,
            Self::Closed => PaymentStatus::Pending,
        }
    }
}

/// Watcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub poll_interval: Duration,
    pub max_wait: Duration,
    /// Messages are only trusted from this domain and its subdomains.
    pub provider_domain: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            max_wait: Duration::from_secs(15 * 60),
            provider_domain: "hubtel.com".to_string(),
        }
    }
}

/// Handle to a running watch.
///
/// Dropping the handle stops the watch.
#[derive(Debug)]
pub struct WatchHandle {
    order_code: OrderCode,
    cancel: CancellationToken,
    task: Option<JoinHandle<PaymentOutcome>>,
}

impl WatchHandle {
    #[must_use]
    pub const fn order_code(&self) -> &OrderCode {
        &self.order_code
    }

    /// Stop watching. The outcome becomes `Closed` unless one was already
    /// decided.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that stops this watch when cancelled, usable after the handle
    /// has been moved into [`WatchHandle::outcome`].
    #[must_use]
    pub fn canceller(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the watch to finish.
    pub async fn outcome(mut self) -> PaymentOutcome {
        let Some(task) = self.task.take() else {
            return PaymentOutcome::Closed;
        };

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(order_code = %self.order_code, error = %e, "Payment watch task failed");
                PaymentOutcome::Closed
            }
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Starts payment watches against an order API.
#[derive(Debug, Clone)]
pub struct Watcher<A> {
    api: A,
    config: WatchConfig,
}

impl<A: OrderApi> Watcher<A> {
    #[must_use]
    pub const fn new(api: A, config: WatchConfig) -> Self {
        Self { api, config }
    }

    /// Start watching `order_code`, listening on `messages` and polling the
    /// status endpoint. Must be called within a tokio runtime.
    #[must_use]
    pub fn start_watching(
        &self,
        order_code: OrderCode,
        messages: broadcast::Receiver<PaymentMessage>,
    ) -> WatchHandle {
        let cancel = CancellationToken::new();
        let watch = Watch {
            api: self.api.clone(),
            config: self.config.clone(),
            order_code: order_code.clone(),
            messages: Some(messages),
            cancel: cancel.clone(),
        };

        info!(%order_code, "Watching for payment confirmation");
        let task = tokio::spawn(watch.run());

        WatchHandle {
            order_code,
            cancel,
            task: Some(task),
        }
    }
}

struct Watch<A> {
    api: A,
    config: WatchConfig,
    order_code: OrderCode,
    /// `None` once every publisher is gone.
    messages: Option<broadcast::Receiver<PaymentMessage>>,
    cancel: CancellationToken,
}

/// What woke the watch loop.
enum Wake {
    Closed,
    Deadline,
    Message(PaymentMessage),
    Tick,
}

impl<A: OrderApi> Watch<A> {
    async fn run(mut self) -> PaymentOutcome {
        let poll_interval = self.config.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = tokio::time::sleep(self.config.max_wait);
        tokio::pin!(deadline);

        let cancel = self.cancel.clone();

        let outcome = loop {
            let wake = tokio::select! {
                biased;

                () = cancel.cancelled() => Wake::Closed,
                () = &mut deadline => Wake::Deadline,
                message = next_message(&mut self.messages) => Wake::Message(message),
                _ = ticker.tick() => Wake::Tick,
            };

            let hint = match wake {
                Wake::Closed => break PaymentOutcome::Closed,
                Wake::Deadline => break PaymentOutcome::TimedOut,
                Wake::Message(message) => match self.classify(message) {
                    Some(kind) => Some(kind),
                    None => continue,
                },
                Wake::Tick => None,
            };

            // Messages are hints; the status endpoint has the final word on payment
            let status = tokio::select! {
                biased;

                () = cancel.cancelled() => break PaymentOutcome::Closed,
                () = &mut deadline => break PaymentOutcome::TimedOut,
                status = self.api.order_status(&self.order_code) => status,
            };

            if let Some(outcome) = self.settle(hint, status) {
                break outcome;
            }
        };

        match outcome {
            PaymentOutcome::TimedOut => {
                warn!(order_code = %self.order_code, "Gave up waiting for payment");
            }
            _ => info!(order_code = %self.order_code, ?outcome, "Payment watch finished"),
        }
        outcome
    }

    /// The kind of a relayed message, ignoring anything not meant for this
    /// order or not from the provider.
    fn classify(&self, message: PaymentMessage) -> Option<MessageKind> {
        if !is_trusted_origin(&message.origin, &self.config.provider_domain) {
            debug!(origin = %message.origin, "Ignoring message from untrusted origin");
            return None;
        }

        if let Some(code) = &message.order_code
            && code != &self.order_code
        {
            debug!(order_code = %code, "Ignoring message for another order");
            return None;
        }

        Some(message.kind)
    }

    /// Decide the outcome from a status answer and the message that prompted
    /// it, if any.
    ///
    /// Only a paid status yields `Succeeded`. A cancel or failure message
    /// ends the watch unless the status already reports the order paid.
    fn settle(
        &self,
        hint: Option<MessageKind>,
        status: Result<OrderStatus, ApiError>,
    ) -> Option<PaymentOutcome> {
        match (status, hint) {
            (Ok(OrderStatus::Paid), _) => Some(PaymentOutcome::Succeeded),
            (Ok(OrderStatus::Cancelled), _) | (_, Some(MessageKind::Cancelled)) => {
                Some(PaymentOutcome::Cancelled)
            }
            (_, Some(MessageKind::Failed)) => Some(PaymentOutcome::Failed),
            (Ok(OrderStatus::Pending(code)), Some(MessageKind::Success)) => {
                warn!(order_code = %self.order_code, code = %code, "Success message not confirmed by order status");
                None
            }
            (Ok(OrderStatus::Pending(code)), None) => {
                debug!(order_code = %self.order_code, code = %code, "Payment still pending");
                None
            }
            (Err(e), _) => {
                warn!(order_code = %self.order_code, error = %e, "Payment status check failed");
                None
            }
        }
    }
}

/// Next message, or pending forever once the channel has closed.
async fn next_message(
    messages: &mut Option<broadcast::Receiver<PaymentMessage>>,
) -> PaymentMessage {
    if let Some(receiver) = messages.as_mut() {
        loop {
            match receiver.recv().await {
                Ok(message) => return message,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Payment message receiver lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        *messages = None;
    }

    std::future::pending().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use tradepost_core::{AddressDetails, CheckoutDetails};

    use super::*;
    use crate::api::OrderConfirmation;
    use crate::payment::PaymentMessageHub;

    const PROVIDER: &str = "https://pay.hubtel.com";

    /// Status endpoint that replays scripted answers, then keeps reporting
    /// pending.
    #[derive(Clone, Default)]
    struct ScriptedStatus {
        answers: Arc<Mutex<VecDeque<Result<OrderStatus, ApiError>>>>,
        polls: Arc<Mutex<Vec<Instant>>>,
    }

    impl ScriptedStatus {
        fn with(answers: Vec<Result<OrderStatus, ApiError>>) -> Self {
            Self {
                answers: Arc::new(Mutex::new(answers.into())),
                polls: Arc::default(),
            }
        }

        fn poll_count(&self) -> usize {
            self.polls.lock().unwrap().len()
        }
    }

    impl OrderApi for ScriptedStatus {
        async fn submit_checkout(
            &self,
            _details: &CheckoutDetails,
        ) -> Result<OrderConfirmation, ApiError> {
            unreachable!("watcher never submits")
        }

        async fn update_delivery(
            &self,
            _address: &AddressDetails,
        ) -> Result<OrderConfirmation, ApiError> {
            unreachable!("watcher never submits")
        }

        async fn order_status(&self, _order_code: &OrderCode) -> Result<OrderStatus, ApiError> {
            self.polls.lock().unwrap().push(Instant::now());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(OrderStatus::Pending("0005".to_string())))
        }
    }

    fn watcher(api: ScriptedStatus) -> Watcher<ScriptedStatus> {
        Watcher::new(api, WatchConfig::default())
    }

    fn message(kind: MessageKind, order_code: &str) -> PaymentMessage {
        PaymentMessage {
            origin: PROVIDER.to_string(),
            order_code: Some(OrderCode::new(order_code)),
            kind,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_beats_poll() {
        let api = ScriptedStatus::with(vec![Ok(OrderStatus::Paid)]);
        let hub = PaymentMessageHub::new();
        let start = Instant::now();
        let handle = watcher(api.clone()).start_watching(OrderCode::new("ORD1"), hub.subscribe());

        tokio::time::sleep(Duration::from_secs(1)).await;
        hub.publish(message(MessageKind::Success, "ORD1"));

        assert_eq!(handle.outcome().await, PaymentOutcome::Succeeded);
        assert_eq!(start.elapsed(), Duration::from_secs(1));

        // Only the check prompted by the message; the poll timer is gone
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.poll_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_success_message_keeps_watching() {
        let api = ScriptedStatus::default();
        let hub = PaymentMessageHub::new();
        let handle = watcher(api.clone()).start_watching(OrderCode::new("ORD1"), hub.subscribe());

        hub.publish(message(MessageKind::Success, "ORD1"));
        hub.publish(PaymentMessage {
            origin: PROVIDER.to_string(),
            order_code: None,
            kind: MessageKind::Success,
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.poll_count(), 2);

        let canceller = handle.canceller();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });
        assert_eq!(handle.outcome().await, PaymentOutcome::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_message_confirmed_by_later_status() {
        let api = ScriptedStatus::with(vec![
            Ok(OrderStatus::Pending("0005".to_string())),
            Ok(OrderStatus::Paid),
        ]);
        let hub = PaymentMessageHub::new();
        let start = Instant::now();
        let handle = watcher(api.clone()).start_watching(OrderCode::new("ORD1"), hub.subscribe());

        hub.publish(message(MessageKind::Success, "ORD1"));

        assert_eq!(handle.outcome().await, PaymentOutcome::Succeeded);
        assert_eq!(api.poll_count(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_message_loses_to_paid_status() {
        let api = ScriptedStatus::with(vec![Ok(OrderStatus::Paid)]);
        let hub = PaymentMessageHub::new();
        let handle = watcher(api).start_watching(OrderCode::new("ORD1"), hub.subscribe());

        hub.publish(message(MessageKind::Cancelled, "ORD1"));

        assert_eq!(handle.outcome().await, PaymentOutcome::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_paid_succeeds() {
        let api = ScriptedStatus::with(vec![
            Ok(OrderStatus::Pending("0005".to_string())),
            Ok(OrderStatus::Paid),
        ]);
        let hub = PaymentMessageHub::new();
        let start = Instant::now();

        let handle = watcher(api.clone()).start_watching(OrderCode::new("ORD1"), hub.subscribe());
        assert_eq!(handle.outcome().await, PaymentOutcome::Succeeded);

        assert_eq!(api.poll_count(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_cancelled_code() {
        let api = ScriptedStatus::with(vec![Ok(OrderStatus::Cancelled)]);
        let hub = PaymentMessageHub::new();

        let handle = watcher(api).start_watching(OrderCode::new("ORD1"), hub.subscribe());
        assert_eq!(handle.outcome().await, PaymentOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_keep_polling() {
        let api = ScriptedStatus::with(vec![
            Err(ApiError::Parse("garbled".to_string())),
            Err(ApiError::Api {
                status: 502,
                message: "bad gateway".to_string(),
            }),
            Ok(OrderStatus::Paid),
        ]);
        let hub = PaymentMessageHub::new();

        let handle = watcher(api.clone()).start_watching(OrderCode::new("ORD1"), hub.subscribe());
        assert_eq!(handle.outcome().await, PaymentOutcome::Succeeded);
        assert_eq!(api.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let api = ScriptedStatus::default();
        let hub = PaymentMessageHub::new();
        let start = Instant::now();

        let handle = watcher(api).start_watching(OrderCode::new("ORD1"), hub.subscribe());
        assert_eq!(handle.outcome().await, PaymentOutcome::TimedOut);
        assert_eq!(start.elapsed(), Duration::from_secs(15 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_untrusted_and_foreign_messages_ignored() {
        let api = ScriptedStatus::default();
        let hub = PaymentMessageHub::new();
        let handle = watcher(api).start_watching(OrderCode::new("ORD1"), hub.subscribe());

        hub.publish(PaymentMessage {
            origin: "https://evil.example".to_string(),
            order_code: Some(OrderCode::new("ORD1")),
            kind: MessageKind::Success,
        });
        hub.publish(message(MessageKind::Success, "ORD2"));
        hub.publish(message(MessageKind::Cancelled, "ORD1"));

        assert_eq!(handle.outcome().await, PaymentOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_without_order_code_applies() {
        let hub = PaymentMessageHub::new();
        let handle =
            watcher(ScriptedStatus::default()).start_watching(OrderCode::new("ORD1"), hub.subscribe());

        hub.publish(PaymentMessage {
            origin: PROVIDER.to_string(),
            order_code: None,
            kind: MessageKind::Failed,
        });

        assert_eq!(handle.outcome().await, PaymentOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_closes() {
        let api = ScriptedStatus::default();
        let hub = PaymentMessageHub::new();
        let handle = watcher(api.clone()).start_watching(OrderCode::new("ORD1"), hub.subscribe());

        let canceller = handle.canceller();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(4)).await;
            canceller.cancel();
        });

        assert_eq!(handle.outcome().await, PaymentOutcome::Closed);
        let polls = api.poll_count();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.poll_count(), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let api = ScriptedStatus::default();
        let hub = PaymentMessageHub::new();
        let handle = watcher(api.clone()).start_watching(OrderCode::new("ORD1"), hub.subscribe());

        tokio::time::sleep(Duration::from_secs(4)).await;
        drop(handle);
        tokio::time::sleep(Duration::from_millis(1)).await;
        let polls = api.poll_count();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.poll_count(), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_hub_falls_back_to_polling() {
        let api = ScriptedStatus::with(vec![Ok(OrderStatus::Paid)]);
        let hub = PaymentMessageHub::new();
        let receiver = hub.subscribe();
        drop(hub);

        let handle = watcher(api).start_watching(OrderCode::new("ORD1"), receiver);
        assert_eq!(handle.outcome().await, PaymentOutcome::Succeeded);
    }

    #[test]
    fn test_outcome_status() {
        assert_eq!(PaymentOutcome::Succeeded.status(), PaymentStatus::Succeeded);
        assert_eq!(PaymentOutcome::TimedOut.status(), PaymentStatus::Failed);
        assert!(!PaymentOutcome::Closed.status().is_terminal());
    }
}
