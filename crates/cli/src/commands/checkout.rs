//! Checkout and resume commands.
//!
//! # Usage
//!
//! ```bash
//! # Cash on delivery commits straight away
//! tradepost checkout --payment cod
//!
//! # Electronic payment: open the printed URL, then wait for confirmation
//! tradepost checkout --payment momo --account-number 0241234567 --listen
//!
//! # After Ctrl+C or a crash
//! tradepost resume --listen
//! ```
//!
//! # Environment Variables
//!
//! Needs the full storefront configuration (`TRADEPOST_API_URL`,
//! `TRADEPOST_BASE_URL`, and the `HUBTEL_*` variables for electronic payments).

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use tradepost_core::{OrderCode, Price};
use tradepost_storefront::api::OrderApiClient;
use tradepost_storefront::checkout::{
    Checkout, CheckoutError, CheckoutOutcome, CheckoutRequest, CommitReceipt,
};
use tradepost_storefront::config::StorefrontConfig;
use tradepost_storefront::error::add_breadcrumb;
use tradepost_storefront::payment::{HubtelGateway, PaymentMessageHub, PaymentOutcome};
use tradepost_storefront::routes;
use tradepost_storefront::state::AppState;

use super::Local;

type CliCheckout = Checkout<OrderApiClient, HubtelGateway>;

/// Place an order for the current cart.
///
/// # Errors
///
/// Returns configuration, validation, commit and payment errors.
#[allow(clippy::print_stdout)]
pub async fn place(
    ctx: Local,
    request: CheckoutRequest,
    listen: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = StorefrontConfig::from_env()?;
    let checkout = build(ctx, &config)?;

    let method = request
        .payment_method
        .map(|m| m.label())
        .unwrap_or_default();
    add_breadcrumb("checkout", "Placing order", Some(&[("payment", method)]));

    match checkout.place_order(request).await? {
        CheckoutOutcome::Committed(receipt) => print_receipt(&receipt),
        CheckoutOutcome::AwaitingPayment(mut session) => {
            println!("Complete your payment at:\n  {}", session.checkout_url);
            let outcome = await_payment(&checkout, &config, &session.order_id, listen).await?;
            session.settle(outcome.status());
            tracing::debug!(status = ?session.status, "Payment session settled");

            let receipt = checkout.complete_payment(&session.order_id, outcome).await?;
            print_receipt(&receipt);
        }
    }
    Ok(())
}

/// Finish an interrupted commit, or keep waiting on a pending payment.
///
/// # Errors
///
/// Returns `NothingToResume` if there is neither, and the commit and payment
/// errors otherwise.
pub async fn resume(ctx: Local, listen: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = StorefrontConfig::from_env()?;
    let checkout = build(ctx, &config)?;

    if let Some(order_code) = checkout.interrupted_commit() {
        add_breadcrumb("checkout", "Resuming commit", Some(&[("order_code", order_code.as_str())]));
        let receipt = checkout.resume_commit().await?;
        print_receipt(&receipt);
        return Ok(());
    }

    let order_code = checkout
        .resume_pending()
        .ok_or(CheckoutError::NothingToResume)?;
    add_breadcrumb("checkout", "Resuming payment", Some(&[("order_code", order_code.as_str())]));
    tracing::info!(order_code = %order_code, "Waiting for pending payment");

    let outcome = await_payment(&checkout, &config, &order_code, listen).await?;
    let receipt = checkout.complete_payment(&order_code, outcome).await?;
    print_receipt(&receipt);
    Ok(())
}

fn build(ctx: Local, config: &StorefrontConfig) -> Result<CliCheckout, Box<dyn std::error::Error>> {
    let api = OrderApiClient::new(&config.api)?;
    let gateway = config.gateway.as_ref().map(HubtelGateway::new).transpose()?;
    if gateway.is_none() {
        tracing::debug!("No payment gateway configured; electronic payments are unavailable");
    }

    Ok(Checkout::new(ctx.store, ctx.delivery, api, gateway)
        .with_retry(config.retry)
        .with_watch_config(config.watch.clone()))
}

/// Watch `order_code` until it settles. Ctrl+C closes the watch, leaving the
/// payment pending for `resume`.
async fn await_payment(
    checkout: &CliCheckout,
    config: &StorefrontConfig,
    order_code: &OrderCode,
    listen: bool,
) -> Result<PaymentOutcome, Box<dyn std::error::Error>> {
    let hub = PaymentMessageHub::new();
    let server_shutdown = CancellationToken::new();

    let server = if listen {
        let listener = TcpListener::bind(config.socket_addr()).await?;
        let state = AppState::from_config(config, hub.clone());
        Some(tokio::spawn(routes::serve(
            listener,
            state,
            server_shutdown.clone(),
        )))
    } else {
        None
    };

    let handle = checkout.watch_payment(order_code.clone(), hub.subscribe());
    let canceller = handle.canceller();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; the payment stays pending (run `tradepost resume`)");
            canceller.cancel();
        }
    });

    let outcome = handle.outcome().await;
    interrupt.abort();
    tracing::info!(order_code = %order_code, ?outcome, "Payment watch finished");

    server_shutdown.cancel();
    if let Some(server) = server
        && let Ok(Err(e)) = server.await
    {
        tracing::warn!(error = %e, "Payment listener stopped with an error");
    }

    Ok(outcome)
}

#[allow(clippy::print_stdout)]
fn print_receipt(receipt: &CommitReceipt) {
    println!("Order placed: {}", receipt.order_code);
    println!("Total:        {}", Price::cedis(receipt.total_amount).display());
    if let Some(message) = &receipt.confirmation.message {
        println!("{message}");
    }
}
