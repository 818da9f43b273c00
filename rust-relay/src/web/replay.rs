//! Replay protection for signed webhooks.
//!
//! Every signed webhook is remembered by its signature digest until its
//! timestamp leaves the acceptance window. That is enough to reject replays:
//! once the window has passed, the timestamp check refuses the request anyway.
//! The digest covers `token + timestamp` together, so re-splitting those
//! fields cannot make an old request look new.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Reasons a request is refused by the [`ReplayGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("request has already been accepted")]
    Replayed,
    #[error("replay cache is full")]
    Full,
}

/// Bounded, time-windowed set of request keys that have already been accepted.
///
/// Entries expire at `timestamp + retention`. Expired entries are swept when
/// the set reaches capacity; if it is still full after the sweep, new keys
/// are refused rather than evicting live ones.
#[derive(Debug)]
pub struct ReplayGuard {
    retention_secs: u64,
    capacity: usize,
    seen: Mutex<HashMap<String, u64>>,
}

impl ReplayGuard {
    pub fn new(retention: Duration, capacity: usize) -> Self {
        Self {
            retention_secs: retention.as_secs(),
            capacity,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record `key` as used, failing if it was already recorded.
    ///
    /// Lookup and insert happen under one lock, so two concurrent requests
    /// carrying the same key cannot both succeed.
    pub fn check_and_insert(&self, key: &str, timestamp: u64, now: u64) -> Result<(), ReplayError> {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(&expires_at) = seen.get(key) {
            if expires_at >= now {
                return Err(ReplayError::Replayed);
            }
        }

        if !seen.contains_key(key) && seen.len() >= self.capacity {
            let before = seen.len();
            seen.retain(|_, expires_at| *expires_at >= now);
            debug!(
                evicted = before - seen.len(),
                remaining = seen.len(),
                "replay_cache_swept"
            );

            if seen.len() >= self.capacity {
                warn!(capacity = self.capacity, "replay_cache_full");
                return Err(ReplayError::Full);
            }
        }

        seen.insert(key.to_string(), timestamp.saturating_add(self.retention_secs));
        Ok(())
    }

    /// Number of keys currently remembered, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
