//! HTTP client that posts relayed messages to a Slack incoming webhook.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use super::payload::{Payload, RelayIdentity};
use crate::config::Config;

/// Longest slice of an error response body kept for logging.
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Failures while relaying a message. None of them are retried.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to serialize slack payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("slack request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("slack request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("slack responded with HTTP {status}")]
    Status { status: u16, body: String },
}

/// Posts messages to a single configured Slack webhook.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct SlackRelay {
    client: Client,
    destination: Url,
    timeout: Duration,
    identity: RelayIdentity,
}

impl std::fmt::Debug for SlackRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackRelay")
            .field("destination_host", &self.destination.host_str())
            .field("timeout", &self.timeout)
            .field("identity", &self.identity)
            .finish()
    }
}

impl SlackRelay {
    pub fn new(destination: Url, timeout: Duration, identity: RelayIdentity) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            destination,
            timeout,
            identity,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.destination()?,
            config.relay_timeout(),
            RelayIdentity::from_config(config),
        )
    }

    /// Host of the destination, safe to log.
    pub fn destination_host(&self) -> &str {
        self.destination.host_str().unwrap_or("<none>")
    }

    /// Post `from` and `content` to Slack as a single form-encoded request.
    ///
    /// The response body is read to the end before returning, on success and
    /// on error status alike, so the connection goes back to the pool.
    pub async fn relay(&self, from: &str, content: &str) -> Result<(), RelayError> {
        let payload = Payload::new(&self.identity, from, content);
        let json = serde_json::to_string(&payload)?;

        let response = self
            .client
            .post(self.destination.clone())
            .form(&[("payload", json.as_str())])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await;

        if !status.is_success() {
            let body = body
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect::<String>();

            error!(
                destination = self.destination_host(),
                status_code = status.as_u16(),
                body = %body,
                "relay_rejected"
            );

            return Err(RelayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        match body {
            Ok(body) => debug!(body_length = body.len(), "relay_response_drained"),
            // Slack already accepted the message; the connection is dropped instead of reused.
            Err(e) => warn!(error = %e, "relay_response_drain_failed"),
        }

        info!(
            destination = self.destination_host(),
            status_code = status.as_u16(),
            text_length = payload.text.len(),
            "relay_succeeded"
        );

        Ok(())
    }

    fn transport_error(&self, e: reqwest::Error) -> RelayError {
        if e.is_timeout() {
            error!(
                destination = self.destination_host(),
                timeout_ms = self.timeout.as_millis() as u64,
                error = %e,
                "relay_timeout"
            );
            RelayError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            error!(
                destination = self.destination_host(),
                error = %e,
                "relay_transport_error"
            );
            RelayError::Transport(e)
        }
    }
}
