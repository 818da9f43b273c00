//! Outbound relay to Slack incoming webhooks.
//!
//! - `payload`: message formatting and the Slack payload shape
//! - `slack`: the HTTP client that posts the payload

pub mod payload;
pub mod slack;

pub use payload::{format_message, Payload, RelayIdentity};
pub use slack::{RelayError, SlackRelay};
