//! Mailgun webhook signature verification.
//!
//! Each inbound request carries `token`, `timestamp` and `signature`, where
//! `signature` is the hex HMAC-SHA256 digest of `token + timestamp` keyed with
//! the shared signing key.
//! Reference: https://documentation.mailgun.com/docs/mailgun/user-manual/events/webhooks/#securing-webhooks

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

use super::replay::{ReplayError, ReplayGuard};

type HmacSha256 = Hmac<Sha256>;

/// Why a webhook failed authentication.
///
/// Only used for logging. Every variant produces the same response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("signing key is not configured")]
    SigningKeyUnset,
    #[error("token, timestamp or signature is missing")]
    MissingFields,
    #[error("timestamp is not a unix time in seconds")]
    InvalidTimestamp,
    #[error("timestamp is {skew_secs}s away from now, allowed {max_skew_secs}s")]
    StaleTimestamp { skew_secs: u64, max_skew_secs: u64 },
    #[error("signature does not match")]
    InvalidSignature,
    #[error("token has already been used")]
    ReplayedToken,
    #[error("replay cache is full")]
    ReplayCacheFull,
}

impl From<ReplayError> for AuthError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::Replayed => AuthError::ReplayedToken,
            ReplayError::Full => AuthError::ReplayCacheFull,
        }
    }
}

/// Check `signature` against `HMAC-SHA256(key, token + timestamp)`.
///
/// The digest is always computed and compared with [`Mac::verify_slice`],
/// which runs in constant time, so a missing or malformed signature costs the
/// same as a wrong one. A blank key never verifies.
pub fn verify_signature(token: &str, timestamp: &str, signature: &str, key: &[u8]) -> bool {
    let mac = match keyed_mac(token, timestamp, key) {
        Some(m) => m,
        None => return false,
    };

    let provided = hex::decode(signature.trim()).unwrap_or_default();
    let matches = mac.verify_slice(&provided).is_ok();

    let key_usable = !key.iter().all(u8::is_ascii_whitespace);

    matches && key_usable && !token.is_empty() && !timestamp.is_empty()
}

/// Compute the hex signature Mailgun would send for `token` and `timestamp`.
///
/// Returns `None` only if the MAC rejects the key, which HMAC never does.
pub fn sign(token: &str, timestamp: &str, key: &[u8]) -> Option<String> {
    let mac = keyed_mac(token, timestamp, key)?;
    Some(hex::encode(mac.finalize().into_bytes()))
}

fn keyed_mac(token: &str, timestamp: &str, key: &[u8]) -> Option<HmacSha256> {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(m) => m,
        Err(_) => {
            warn!("webhook_signature_invalid_key");
            return None;
        }
    };

    mac.update(token.as_bytes());
    mac.update(timestamp.as_bytes());
    Some(mac)
}

/// Enforcing verifier: signature, timestamp window and single-use tokens.
pub struct SignatureVerifier {
    key: Option<Vec<u8>>,
    max_skew: Duration,
    replay: ReplayGuard,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("max_skew", &self.max_skew)
            .field("replay", &self.replay)
            .finish()
    }
}

impl SignatureVerifier {
    /// Create a verifier. A missing or blank key makes every request fail.
    pub fn new(key: Option<String>, max_skew: Duration, replay_capacity: usize) -> Self {
        let key = key
            .filter(|k| !k.trim().is_empty())
            .map(String::into_bytes);

        Self {
            key,
            max_skew,
            replay: ReplayGuard::new(max_skew, replay_capacity),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Verify a webhook against the current wall clock.
    pub fn verify(&self, token: &str, timestamp: &str, signature: &str) -> Result<(), AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        self.verify_at(token, timestamp, signature, now)
    }

    /// Verify a webhook as of `now` (unix seconds).
    ///
    /// The timestamp must be written canonically (no sign, padding or leading
    /// zeros). The replay cache is keyed on the signature digest, so moving
    /// characters between `token` and `timestamp` cannot produce a fresh entry.
    /// Nothing is recorded until everything else has passed, so
    /// unauthenticated requests never occupy the replay cache.
    pub fn verify_at(
        &self,
        token: &str,
        timestamp: &str,
        signature: &str,
        now: u64,
    ) -> Result<(), AuthError> {
        let key = self.key.as_deref().unwrap_or_default();
        let signature_ok = verify_signature(token, timestamp, signature, key);

        if self.key.is_none() {
            return Err(AuthError::SigningKeyUnset);
        }

        if token.is_empty() || timestamp.is_empty() || signature.is_empty() {
            return Err(AuthError::MissingFields);
        }

        let sent_at: u64 = timestamp
            .parse()
            .map_err(|_| AuthError::InvalidTimestamp)?;
        if sent_at.to_string() != timestamp {
            return Err(AuthError::InvalidTimestamp);
        }

        let skew_secs = now.abs_diff(sent_at);
        let max_skew_secs = self.max_skew.as_secs();
        if skew_secs > max_skew_secs {
            warn!(
                webhook_time = sent_at,
                current_time = now,
                skew_seconds = skew_secs,
                max_skew_seconds = max_skew_secs,
                "webhook_timestamp_outside_window"
            );
            return Err(AuthError::StaleTimestamp {
                skew_secs,
                max_skew_secs,
            });
        }

        if !signature_ok {
            return Err(AuthError::InvalidSignature);
        }

        let digest = signature.trim().to_ascii_lowercase();
        self.replay.check_and_insert(&digest, sent_at, now)?;

        Ok(())
    }

    /// Number of signatures held for replay protection.
    pub fn tracked_signatures(&self) -> usize {
        self.replay.len()
    }
}
