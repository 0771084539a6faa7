//! Payment return, cancel and callback handlers.
//!
//! Each handler turns what the provider sent into a [`PaymentMessage`] and
//! publishes it on the hub. Whether the message is trusted is decided by the
//! watcher, not here.

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, header},
    response::Html,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use tradepost_core::OrderCode;

use crate::api::PAID_CODE;
use crate::error::{AppError, Result};
use crate::payment::{MessageKind, PaymentMessage};
use crate::state::AppState;

const RETURN_PAGE: &str = "<!doctype html><title>Payment received</title>\
<p>Payment received. You can close this window and return to the terminal.</p>";

const CANCEL_PAGE: &str = "<!doctype html><title>Payment cancelled</title>\
<p>Payment cancelled. You can close this window.</p>";

/// `?order_id=` on the URLs handed to the gateway.
#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    order_id: Option<String>,
}

impl OrderQuery {
    fn order_code(&self) -> Option<OrderCode> {
        self.order_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(OrderCode::from)
    }
}

/// Hubtel server callback body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallbackPayload {
    response_code: String,
    #[serde(default)]
    data: Option<CallbackData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallbackData {
    #[serde(default)]
    client_reference: Option<String>,
}

/// Customer was sent back after paying.
#[instrument(skip(state, headers))]
pub async fn payment_return(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
    headers: HeaderMap,
) -> Html<&'static str> {
    publish(&state, request_origin(&headers), query.order_code(), MessageKind::Success);
    Html(RETURN_PAGE)
}

/// Customer cancelled on the hosted page.
#[instrument(skip(state, headers))]
pub async fn payment_cancel(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
    headers: HeaderMap,
) -> Html<&'static str> {
    publish(&state, request_origin(&headers), query.order_code(), MessageKind::Cancelled);
    Html(CANCEL_PAGE)
}

/// Provider notification. `ResponseCode` "0000" means paid; anything else is
/// a failed payment.
#[instrument(skip(state, payload))]
pub async fn payment_callback(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
    Json(payload): Json<CallbackPayload>,
) -> Result<Json<Value>> {
    let order_code = payload
        .data
        .as_ref()
        .and_then(|d| d.client_reference.as_deref())
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(OrderCode::from)
        .or_else(|| query.order_code())
        .ok_or_else(|| AppError::BadRequest("callback names no order".to_string()))?;

    let kind = if payload.response_code.trim() == PAID_CODE {
        MessageKind::Success
    } else {
        MessageKind::Failed
    };

    let origin = state.provider_origin().to_string();
    publish(&state, origin, Some(order_code), kind);
    Ok(Json(json!({ "received": true })))
}

fn publish(state: &AppState, origin: String, order_code: Option<OrderCode>, kind: MessageKind) {
    info!(%origin, order_code = ?order_code, ?kind, "Payment notification");
    state.hub().publish(PaymentMessage {
        origin,
        order_code,
        kind,
    });
}

/// The `Origin` header, else the `Referer` header, else empty.
fn request_origin(headers: &HeaderMap) -> String {
    [header::ORIGIN, header::REFERER]
        .iter()
        .find_map(|name| headers.get(name).and_then(|v| v.to_str().ok()))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio::sync::broadcast;
    use tower::ServiceExt;

    use super::*;
    use crate::payment::PaymentMessageHub;
    use crate::routes::app;

    fn setup() -> (axum::Router, broadcast::Receiver<PaymentMessage>) {
        let hub = PaymentMessageHub::new();
        let messages = hub.subscribe();
        let state = AppState::new(hub, "https://pay.hubtel.com");
        (app(state), messages)
    }

    #[tokio::test]
    async fn test_return_publishes_success_with_referer_origin() {
        let (app, mut messages) = setup();

        let response = app
            .oneshot(
                Request::get("/payment/return?order_id=ORD123")
                    .header("referer", "https://pay.hubtel.com/checkout/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let message = messages.try_recv().unwrap();
        assert_eq!(message.kind, MessageKind::Success);
        assert_eq!(message.order_code, Some(OrderCode::new("ORD123")));
        assert_eq!(message.origin, "https://pay.hubtel.com/checkout/abc");
    }

    #[tokio::test]
    async fn test_cancel_prefers_origin_header() {
        let (app, mut messages) = setup();

        app.oneshot(
            Request::get("/payment/cancel?order_id=ORD123")
                .header("origin", "https://pay.hubtel.com")
                .header("referer", "https://elsewhere.example/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

        let message = messages.try_recv().unwrap();
        assert_eq!(message.kind, MessageKind::Cancelled);
        assert_eq!(message.origin, "https://pay.hubtel.com");
    }

    #[tokio::test]
    async fn test_callback_paid_and_failed() {
        let (app, mut messages) = setup();

        let paid = json!({
            "ResponseCode": "0000",
            "Status": "Success",
            "Data": {"ClientReference": "ORD123", "Amount": 250.0}
        });
        let response = app
            .clone()
            .oneshot(
                Request::post("/payment/callback")
                    .header("content-type", "application/json")
                    .body(Body::from(paid.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let message = messages.try_recv().unwrap();
        assert_eq!(message.kind, MessageKind::Success);
        assert_eq!(message.origin, "https://pay.hubtel.com");
        assert_eq!(message.order_code, Some(OrderCode::new("ORD123")));

        let failed = json!({"ResponseCode": "2001", "Data": {}});
        app.oneshot(
            Request::post("/payment/callback?order_id=ORD456")
                .header("content-type", "application/json")
                .body(Body::from(failed.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

        let message = messages.try_recv().unwrap();
        assert_eq!(message.kind, MessageKind::Failed);
        assert_eq!(message.order_code, Some(OrderCode::new("ORD456")));
    }

    #[tokio::test]
    async fn test_callback_without_order_is_bad_request() {
        let (app, mut messages) = setup();

        let response = app
            .oneshot(
                Request::post("/payment/callback")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"ResponseCode":"0000"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(messages.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_health_and_fallback() {
        let (app, _messages) = setup();

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
