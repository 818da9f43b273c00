//! SlackMail - relays Mailgun inbound email webhooks to Slack.
//!
//! ## Architecture
//!
//! ```text
//! Mailgun route → POST / → signature check → Slack incoming webhook
//! ```

pub mod config;
pub mod relay;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use relay::{format_message, Payload, RelayError, RelayIdentity, SlackRelay};
pub use web::{router, AppState, AuthError, SignatureVerifier};
