//! Integration tests for hosted (Mobile Money / card) payments.
//!
//! The gateway initiate endpoint and the order API share one `wiremock`
//! server. Confirmation arrives either by polling the status endpoint or
//! through the payment listener routes served on a local port.
//!
//! Run with: cargo test -p tradepost-integration-tests

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, ResponseTemplate};

use tradepost_core::{CheckoutState, PaymentMethod, PaymentStatus};
use tradepost_integration_tests::TestContext;
use tradepost_storefront::checkout::{CheckoutError, CheckoutOutcome, CheckoutRequest};
use tradepost_storefront::payment::{GatewayError, PaymentMessageHub, PaymentOutcome};
use tradepost_storefront::routes;
use tradepost_storefront::state::AppState;

fn momo_request() -> CheckoutRequest {
    CheckoutRequest {
        recipient_name: Some("Kofi Boateng".to_string()),
        recipient_contact_number: Some("0201234567".to_string()),
        payment_method: Some(PaymentMethod::MobileMoney),
        payment_account_number: Some("0201234567".to_string()),
        ..Default::default()
    }
}

async fn mount_initiate(ctx: &TestContext) {
    Mock::given(method("POST"))
        .and(path("/items/initiate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responseCode": "0000",
            "status": "Success",
            "data": {"checkoutUrl": "https://pay.hubtel.com/checkout/abc"}
        })))
        .expect(1)
        .mount(&ctx.server)
        .await;
}

async fn mount_order_api(ctx: &TestContext, expected_commits: u64) {
    Mock::given(method("POST"))
        .and(path("/orders/checkout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(expected_commits)
        .mount(&ctx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders/delivery-address"))
        .respond_with(ResponseTemplate::new(200))
        .expect(expected_commits)
        .mount(&ctx.server)
        .await;
}

async fn mount_status(ctx: &TestContext, code: &str) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/orders/[^/]+/status$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responseCode": code})))
        .mount(&ctx.server)
        .await;
}

async fn start_payment(ctx: &TestContext) {
    ctx.fill_cart(&[("KENTE-01", 100, 1), ("SHEA-02", 50, 1)]);
    ctx.delivery().select_by_region_town("Greater Accra", "Accra").unwrap();
    mount_initiate(ctx).await;
}

// ============================================================================
// Confirmation by polling
// ============================================================================

#[tokio::test]
async fn test_electronic_payment_confirmed_by_polling() {
    let ctx = TestContext::new().await;
    start_payment(&ctx).await;
    mount_order_api(&ctx, 1).await;
    mount_status(&ctx, "0000").await;

    let checkout = ctx.checkout(Duration::from_millis(50));
    let outcome = checkout.place_order(momo_request()).await.unwrap();
    let CheckoutOutcome::AwaitingPayment(session) = outcome else {
        panic!("expected a hosted payment");
    };
    assert_eq!(session.checkout_url, "https://pay.hubtel.com/checkout/abc");
    assert_eq!(session.status, PaymentStatus::Pending);
    assert_eq!(checkout.state(), CheckoutState::AwaitingPayment);
    assert_eq!(checkout.resume_pending(), Some(session.order_id.clone()));

    // Nothing is committed until the payment is confirmed
    let requests = ctx.server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/orders/checkout"));

    let hub = PaymentMessageHub::new();
    let receipt = checkout
        .confirm_payment(&session.order_id, hub.subscribe())
        .await
        .unwrap();

    assert_eq!(receipt.order_code, session.order_id);
    assert_eq!(receipt.total_amount.to_string(), "150");
    assert_eq!(checkout.state(), CheckoutState::Committed);
    assert!(checkout.resume_pending().is_none());
    assert!(ctx.cart().items().is_empty());

    let initiate = ctx
        .server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.url.path() == "/items/initiate")
        .unwrap();
    let body = initiate.body_json::<serde_json::Value>().unwrap();
    assert_eq!(body["clientReference"], session.order_id.as_str());
    assert_eq!(body["description"], "Product KENTE-01, Product SHEA-02");
}

#[tokio::test]
async fn test_cancelled_payment_discards_pending_order() {
    let ctx = TestContext::new().await;
    start_payment(&ctx).await;
    mount_order_api(&ctx, 0).await;
    mount_status(&ctx, "2001").await;

    let checkout = ctx.checkout(Duration::from_millis(50));
    let CheckoutOutcome::AwaitingPayment(session) =
        checkout.place_order(momo_request()).await.unwrap()
    else {
        panic!("expected a hosted payment");
    };

    let hub = PaymentMessageHub::new();
    let err = checkout
        .confirm_payment(&session.order_id, hub.subscribe())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::PaymentCancelled(code) if code == session.order_id));
    assert_eq!(checkout.state(), CheckoutState::Idle);
    assert!(checkout.resume_pending().is_none());
    assert_eq!(ctx.cart().items().len(), 2);
}

// ============================================================================
// Confirmation through the listener
// ============================================================================

#[tokio::test]
async fn test_return_route_confirms_payment() {
    let ctx = TestContext::new().await;
    start_payment(&ctx).await;
    mount_order_api(&ctx, 1).await;
    mount_status(&ctx, "0000").await;

    // The first poll is far off; only the check prompted by the return settles it
    let checkout = ctx.checkout(Duration::from_secs(60));
    let CheckoutOutcome::AwaitingPayment(mut session) =
        checkout.place_order(momo_request()).await.unwrap()
    else {
        panic!("expected a hosted payment");
    };

    let hub = PaymentMessageHub::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(routes::serve(
        listener,
        AppState::new(hub.clone(), "https://pay.hubtel.com"),
        shutdown.clone(),
    ));

    let handle = checkout.watch_payment(session.order_id.clone(), hub.subscribe());

    let response = reqwest::Client::new()
        .get(format!(
            "http://{addr}/payment/return?order_id={}",
            session.order_id
        ))
        .header("referer", "https://pay.hubtel.com/checkout/abc")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let outcome = handle.outcome().await;
    assert!(session.settle(outcome.status()));
    assert_eq!(session.status, PaymentStatus::Succeeded);

    let receipt = checkout
        .complete_payment(&session.order_id, outcome)
        .await
        .unwrap();
    assert_eq!(receipt.order_code, session.order_id);
    assert_eq!(checkout.state(), CheckoutState::Committed);

    shutdown.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_untrusted_return_is_ignored_until_closed() {
    let ctx = TestContext::new().await;
    start_payment(&ctx).await;
    mount_order_api(&ctx, 0).await;
    mount_status(&ctx, "0005").await;

    let checkout = ctx.checkout(Duration::from_secs(60));
    let CheckoutOutcome::AwaitingPayment(session) =
        checkout.place_order(momo_request()).await.unwrap()
    else {
        panic!("expected a hosted payment");
    };

    let hub = PaymentMessageHub::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(routes::serve(
        listener,
        AppState::new(hub.clone(), "https://pay.hubtel.com"),
        shutdown.clone(),
    ));

    let handle = checkout.watch_payment(session.order_id.clone(), hub.subscribe());
    let canceller = handle.canceller();

    reqwest::Client::new()
        .get(format!(
            "http://{addr}/payment/return?order_id={}",
            session.order_id
        ))
        .header("referer", "https://pay.hubtel.com.evil.example/")
        .send()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    canceller.cancel();
    let outcome = handle.outcome().await;

    let err = checkout
        .complete_payment(&session.order_id, outcome)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::PaymentClosed(_)));
    // Still resumable
    assert_eq!(checkout.resume_pending(), Some(session.order_id));

    shutdown.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_forged_notifications_do_not_commit_unpaid_order() {
    let ctx = TestContext::new().await;
    start_payment(&ctx).await;
    mount_order_api(&ctx, 0).await;
    mount_status(&ctx, "0005").await;

    let checkout = ctx.checkout(Duration::from_secs(60));
    let CheckoutOutcome::AwaitingPayment(mut session) =
        checkout.place_order(momo_request()).await.unwrap()
    else {
        panic!("expected a hosted payment");
    };

    let hub = PaymentMessageHub::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(routes::serve(
        listener,
        AppState::new(hub.clone(), "https://pay.hubtel.com"),
        shutdown.clone(),
    ));

    let handle = checkout.watch_payment(session.order_id.clone(), hub.subscribe());
    let canceller = handle.canceller();
    let client = reqwest::Client::new();

    // A server callback claiming success, and a return carrying the provider's referer
    let callback = client
        .post(format!("http://{addr}/payment/callback?order_id={}", session.order_id))
        .json(&json!({"ResponseCode": "0000"}))
        .send()
        .await
        .unwrap();
    assert!(callback.status().is_success());
    client
        .get(format!("http://{addr}/payment/return"))
        .header("referer", "https://pay.hubtel.com/")
        .send()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    canceller.cancel();
    let outcome = handle.outcome().await;
    assert_eq!(outcome, PaymentOutcome::Closed);
    session.settle(outcome.status());
    assert_eq!(session.status, PaymentStatus::Pending);

    let status_checks = ctx
        .server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().ends_with("/status"))
        .count();
    assert_eq!(status_checks, 2);

    let err = checkout
        .complete_payment(&session.order_id, outcome)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::PaymentClosed(_)));
    assert_eq!(checkout.resume_pending(), Some(session.order_id));
    assert_eq!(ctx.cart().items().len(), 2);

    shutdown.cancel();
    server.await.unwrap().unwrap();
}

// ============================================================================
// Gateway failures
// ============================================================================

#[tokio::test]
async fn test_gateway_rejection_places_nothing() {
    let ctx = TestContext::new().await;
    ctx.fill_cart(&[("KENTE-01", 100, 1)]);
    ctx.delivery().select_by_region_town("Greater Accra", "Accra").unwrap();

    Mock::given(method("POST"))
        .and(path("/items/initiate"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .expect(1)
        .mount(&ctx.server)
        .await;
    mount_order_api(&ctx, 0).await;

    let checkout = ctx.checkout(Duration::from_millis(50));
    let err = checkout.place_order(momo_request()).await.unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Gateway(GatewayError::Rejected { status: 401, .. })
    ));
    assert_eq!(checkout.state(), CheckoutState::Idle);
    assert!(checkout.resume_pending().is_none());
    assert_eq!(ctx.cart().items().len(), 1);
}
