//! HTTP route handlers for the payment listener.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                       - Health check
//!
//! # Payment (URLs handed to the gateway)
//! GET  /payment/return?order_id=     - Customer returned after paying
//! GET  /payment/cancel?order_id=     - Customer cancelled on the hosted page
//! POST /payment/callback?order_id=   - Provider server-to-server notification
//! ```

pub mod payment;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/return", get(payment::payment_return))
        .route("/cancel", get(payment::payment_cancel))
        .route("/callback", post(payment::payment_callback))
}

/// Build the full listener application.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/payment", payment_routes())
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the listener application until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("payment listener on {}", addr);
    }

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> AppError {
    AppError::NotFound("no such route".to_string())
}
