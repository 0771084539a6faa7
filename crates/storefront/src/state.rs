//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::payment::PaymentMessageHub;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    hub: PaymentMessageHub,
    provider_origin: String,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `hub` - Hub the payment routes publish to
    /// * `provider_origin` - Origin attributed to server-to-server callbacks
    #[must_use]
    pub fn new(hub: PaymentMessageHub, provider_origin: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                hub,
                provider_origin: provider_origin.into(),
            }),
        }
    }

    /// State for the configured payment provider.
    #[must_use]
    pub fn from_config(config: &StorefrontConfig, hub: PaymentMessageHub) -> Self {
        Self::new(hub, config.provider_origin())
    }

    #[must_use]
    pub fn hub(&self) -> &PaymentMessageHub {
        &self.inner.hub
    }

    #[must_use]
    pub fn provider_origin(&self) -> &str {
        &self.inner.provider_origin
    }
}
