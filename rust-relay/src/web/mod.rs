//! Web server module for the inbound Mailgun webhook.
//!
//! Routes:
//! - `POST /`: verify and relay an inbound email
//! - `GET /health`: liveness probe

pub mod handlers;
pub mod replay;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{health, receive_webhook, AppState, HealthResponse, InboundForm};
pub use replay::{ReplayError, ReplayGuard};
pub use signature::{sign, verify_signature, AuthError, SignatureVerifier};

/// Build the application router. Other methods on `/` get 405.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(receive_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
