//! HTTP client for the order API.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use tradepost_core::{AddressDetails, CheckoutDetails, OrderCode};

use super::{ApiError, OrderApi, OrderConfirmation, OrderStatus};
use crate::config::OrderApiConfig;

const CHECKOUT_PATH: &str = "/orders/checkout";
const DELIVERY_PATH: &str = "/orders/delivery-address";

/// Order API client.
///
/// Cheaply cloneable; clones share the connection pool.
#[derive(Clone)]
pub struct OrderApiClient {
    inner: Arc<OrderApiClientInner>,
}

struct OrderApiClientInner {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(rename = "responseCode", alias = "ResponseCode", alias = "code")]
    response_code: String,
}

impl OrderApiClient {
    /// Create a new order API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &OrderApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(OrderApiClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                token: config.token.clone(),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.inner.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn post_json<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<OrderConfirmation, ApiError> {
        let response = self
            .authorize(self.inner.client.post(self.url(path)))
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(OrderConfirmation::default());
        }

        // Some deployments answer with a bare string instead of an object
        serde_json::from_str(&text).or_else(|_| {
            Ok(OrderConfirmation {
                message: Some(text),
                order_id: None,
            })
        })
    }
}

impl OrderApi for OrderApiClient {
    #[instrument(skip(self, details), fields(order_code = %details.order_code))]
    async fn submit_checkout(
        &self,
        details: &CheckoutDetails,
    ) -> Result<OrderConfirmation, ApiError> {
        let confirmation = self.post_json(CHECKOUT_PATH, details).await?;
        debug!("Checkout accepted");
        Ok(confirmation)
    }

    #[instrument(skip(self, address), fields(order_code = %address.order_code))]
    async fn update_delivery(
        &self,
        address: &AddressDetails,
    ) -> Result<OrderConfirmation, ApiError> {
        let confirmation = self.post_json(DELIVERY_PATH, address).await?;
        debug!("Delivery address accepted");
        Ok(confirmation)
    }

    #[instrument(skip(self, order_code), fields(order_code = %order_code))]
    async fn order_status(&self, order_code: &OrderCode) -> Result<OrderStatus, ApiError> {
        let encoded: String =
            url::form_urlencoded::byte_serialize(order_code.as_str().as_bytes()).collect();
        let url = self.url(&format!("/orders/{encoded}/status"));

        let response = self.authorize(self.inner.client.get(url)).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        Ok(OrderStatus::from_code(&body.response_code))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;
    use tradepost_core::{AccountType, CartId, CustomerId, PaymentMethod};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer, token: Option<&str>) -> OrderApiClient {
        OrderApiClient::new(&OrderApiConfig {
            base_url: format!("{}/", server.uri()),
            token: token.map(SecretString::from),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn details() -> CheckoutDetails {
        CheckoutDetails {
            cart_id: CartId::new("cart-1"),
            customer_id: CustomerId::new("c-1"),
            order_code: OrderCode::new("ORD123"),
            payment_mode: PaymentMethod::CashOnDelivery,
            payment_account_number: None,
            customer_account_type: AccountType::Customer,
            total_amount: Decimal::from(200),
            recipient_name: "Ama Mensah".to_string(),
            recipient_contact_number: "0241234567".to_string(),
            order_note: String::new(),
            order_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_submit_checkout_posts_json_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders/checkout"))
            .and(header("authorization", "Bearer tok-123"))
            .and(body_partial_json(json!({"orderCode": "ORD123", "totalAmount": 200.0})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"message": "created"})))
            .expect(1)
            .mount(&server)
            .await;

        let confirmation = client(&server, Some("tok-123"))
            .submit_checkout(&details())
            .await
            .unwrap();
        assert_eq!(confirmation.message.as_deref(), Some("created"));
    }

    #[tokio::test]
    async fn test_error_status_is_reported_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders/checkout"))
            .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .submit_checkout(&details())
            .await
            .unwrap_err();
        match err {
            ApiError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "database down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_plain_text_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders/delivery-address"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let address = AddressDetails {
            order_code: OrderCode::new("ORD123"),
            address: "Accra (Greater Accra)".to_string(),
            customer_id: CustomerId::new("c-1"),
            recipient_name: "Ama Mensah".to_string(),
            recipient_contact_number: "0241234567".to_string(),
            order_note: String::new(),
            geo_location: None,
        };
        let confirmation = client(&server, None)
            .update_delivery(&address)
            .await
            .unwrap();
        assert_eq!(confirmation.message.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_order_status_codes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/ORD123/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responseCode": "2001"})))
            .mount(&server)
            .await;

        let status = client(&server, None)
            .order_status(&OrderCode::new("ORD123"))
            .await
            .unwrap();
        assert_eq!(status, OrderStatus::Cancelled);
    }
}
