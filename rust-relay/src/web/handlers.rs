//! Webhook endpoint handlers.
//!
//! The inbound handler only:
//! 1. Verifies the Mailgun signature, timestamp and token
//! 2. Relays sender and text to Slack
//! 3. Maps the outcome to 200, 401 or 500 with an empty body

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{rejection::FormRejection, Form, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::relay::SlackRelay;
use crate::web::signature::SignatureVerifier;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<SignatureVerifier>,
    pub relay: SlackRelay,
}

impl AppState {
    /// Build the state from configuration. Fails when the relay destination is unusable.
    pub fn new(config: &Config) -> Result<Self> {
        let verifier = SignatureVerifier::new(
            config.mailgun_key.clone(),
            config.signature_max_skew(),
            config.replay_cache_capacity,
        );
        let relay = SlackRelay::from_config(config)?;

        Ok(Self {
            verifier: Arc::new(verifier),
            relay,
        })
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Mailgun Webhook
// =============================================================================

/// Mailgun form payload.
///
/// Mailgun sends form-encoded data with hyphenated field names.
/// Missing fields decode as empty strings and fail verification.
#[derive(Debug, Default, Deserialize)]
pub struct InboundForm {
    #[serde(default)]
    pub from: String,
    #[serde(default, rename = "stripped-text")]
    pub content: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub signature: String,
}

/// Mailgun webhook endpoint.
///
/// Every authentication failure, including an undecodable body, answers with
/// the same bare 401 so callers cannot tell which check failed.
pub async fn receive_webhook(
    State(state): State<AppState>,
    form: Result<Form<InboundForm>, FormRejection>,
) -> StatusCode {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!(error = %rejection, "webhook_body_rejected");
            return StatusCode::UNAUTHORIZED;
        }
    };

    info!(
        from = %form.from,
        content_length = form.content.len(),
        has_token = !form.token.is_empty(),
        has_signature = !form.signature.is_empty(),
        "webhook_received"
    );

    if let Err(reason) = state
        .verifier
        .verify(&form.token, &form.timestamp, &form.signature)
    {
        warn!(from = %form.from, reason = %reason, "webhook_signature_invalid");
        return StatusCode::UNAUTHORIZED;
    }

    if let Err(e) = state.relay.relay(&form.from, &form.content).await {
        error!(
            from = %form.from,
            destination = state.relay.destination_host(),
            error = %e,
            "webhook_relay_failed"
        );
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    info!(from = %form.from, "webhook_relayed");

    StatusCode::OK
}
