//! Integration tests for Tradepost.
//!
//! The checkout flows run against `wiremock` stand-ins for the order API and
//! the payment gateway, with a file-backed store in a temporary directory.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tradepost-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - Direct commits, retries and partial commits
//! - `payment_flow` - Hosted payments confirmed by polling or by the listener

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use tempfile::TempDir;
use wiremock::MockServer;

use tradepost_core::CartItem;
use tradepost_storefront::api::OrderApiClient;
use tradepost_storefront::cart::CartStore;
use tradepost_storefront::checkout::{Checkout, RetryPolicy};
use tradepost_storefront::config::{GatewayConfig, OrderApiConfig};
use tradepost_storefront::delivery::{DeliveryResolver, DeliveryTable};
use tradepost_storefront::payment::{HubtelGateway, WatchConfig};
use tradepost_storefront::storage::LocalStore;

/// Fee table used by every test: one free town and one paid town.
pub const DELIVERY_TABLE: &str = r#"{
    "Greater Accra": [
        {"town": "Accra", "delivery_fee": "Free delivery"},
        {"town": "Tema", "delivery_fee": 20}
    ]
}"#;

/// Retry policy with millisecond delays so exhaustion tests stay fast.
pub const FAST_RETRY: RetryPolicy = RetryPolicy {
    max_attempts: 3,
    initial_delay: Duration::from_millis(10),
    backoff_factor: 2,
};

/// A store on disk plus a mock server standing in for the order API and the
/// gateway.
pub struct TestContext {
    pub server: MockServer,
    pub store: LocalStore,
    _dir: TempDir,
}

impl TestContext {
    /// Start the mock server and open an empty store.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[allow(clippy::unwrap_used)]
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::file(dir.path().join("store.json")).unwrap();
        Self {
            server,
            store,
            _dir: dir,
        }
    }

    /// Cart over the test store.
    #[must_use]
    pub fn cart(&self) -> CartStore {
        CartStore::new(self.store.clone())
    }

    /// Delivery resolver over the test store and [`DELIVERY_TABLE`].
    ///
    /// # Panics
    ///
    /// Panics if [`DELIVERY_TABLE`] does not parse.
    #[allow(clippy::unwrap_used)]
    #[must_use]
    pub fn delivery(&self) -> DeliveryResolver {
        DeliveryResolver::new(
            DeliveryTable::from_json(DELIVERY_TABLE).unwrap(),
            self.store.clone(),
        )
    }

    /// Put `[{100 x 2}, {50 x 1}]`-style lines in the cart.
    ///
    /// # Panics
    ///
    /// Panics if the store cannot be written.
    #[allow(clippy::unwrap_used)]
    pub fn fill_cart(&self, lines: &[(&str, i64, u32)]) {
        let cart = self.cart();
        for (id, price, qty) in lines {
            cart.add(CartItem::new(*id, format!("Product {id}"), Decimal::from(*price), *qty))
                .unwrap();
        }
    }

    #[must_use]
    pub fn api_config(&self) -> OrderApiConfig {
        OrderApiConfig {
            base_url: self.server.uri(),
            token: Some(SecretString::from("test-token")),
            timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            client_id: "merchant-api".to_string(),
            client_secret: SecretString::from("f3a9c1e07b2d4a68"),
            merchant_account: "HM123".to_string(),
            initiate_url: format!("{}/items/initiate", self.server.uri()),
            origin: "https://pay.hubtel.com".to_string(),
            callback_base_url: "https://shop.example.com/".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Orchestrator wired to the mock server, with fast retries and polling.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP clients cannot be built.
    #[allow(clippy::unwrap_used)]
    #[must_use]
    pub fn checkout(&self, poll_interval: Duration) -> Checkout<OrderApiClient, HubtelGateway> {
        let api = OrderApiClient::new(&self.api_config()).unwrap();
        let gateway = HubtelGateway::new(&self.gateway_config()).unwrap();
        Checkout::new(self.store.clone(), self.delivery(), api, Some(gateway))
            .with_retry(FAST_RETRY)
            .with_watch_config(WatchConfig {
                poll_interval,
                max_wait: Duration::from_secs(10),
                provider_domain: "hubtel.com".to_string(),
            })
    }
}
