//! Payment messages relayed from the provider.

use tokio::sync::broadcast;
use tracing::debug;
use url::Url;

use tradepost_core::OrderCode;

const HUB_CAPACITY: usize = 32;

/// What the provider reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Cancelled,
    Failed,
}

impl MessageKind {
    /// Parse a message tag such as `"success"` or `"cancelled"`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "success" | "paid" => Some(Self::Success),
            "cancelled" | "canceled" | "cancel" => Some(Self::Cancelled),
            "failed" | "failure" | "error" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A message about a payment, as received by the listener routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMessage {
    /// Origin the message claims to come from (scheme and host).
    pub origin: String,
    /// Order the message refers to, when it says.
    pub order_code: Option<OrderCode>,
    pub kind: MessageKind,
}

/// Fan-out of payment messages to any active watchers.
///
/// Cheaply cloneable; clones publish to the same subscribers.
#[derive(Debug, Clone)]
pub struct PaymentMessageHub {
    sender: broadcast::Sender<PaymentMessage>,
}

impl Default for PaymentMessageHub {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentMessageHub {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(HUB_CAPACITY);
        Self { sender }
    }

    /// Publish a message. Returns the number of watchers that received it.
    pub fn publish(&self, message: PaymentMessage) -> usize {
        debug!(origin = %message.origin, kind = ?message.kind, "Payment message");
        self.sender.send(message).unwrap_or(0)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PaymentMessage> {
        self.sender.subscribe()
    }
}

/// Whether `origin` is the provider domain or one of its subdomains.
#[must_use]
pub fn is_trusted_origin(origin: &str, provider_domain: &str) -> bool {
    let Ok(url) = Url::parse(origin) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };

    let host = host.to_ascii_lowercase();
    let domain = provider_domain.trim().trim_start_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }

    host == domain
        || host
            .strip_suffix(&domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
