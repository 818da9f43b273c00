//! Configuration module for environment variable parsing.
//!
//! All values are read once at startup. Invalid values fall back to their
//! defaults with a warning rather than aborting the process.

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::warn;
use url::Url;

/// Icon shown next to relayed messages in Slack.
pub const DEFAULT_ICON_URL: &str =
    "https://raw.githubusercontent.com/mailgun/media/master/Mailgun_Icon.png";

/// Username the relayed messages are posted under.
pub const DEFAULT_USERNAME: &str = "slackmail";

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Mailgun signing key for HMAC signature verification
    pub mailgun_key: Option<String>,

    /// Slack incoming webhook URL messages are relayed to
    pub slack_webhook_url: Option<String>,

    /// Address the web server binds to
    pub bind_addr: IpAddr,

    /// Port for the web server to listen on
    pub port: u16,

    /// Maximum distance in seconds between a webhook timestamp and now
    pub signature_max_skew_secs: u64,

    /// Maximum number of webhook tokens remembered for replay protection
    pub replay_cache_capacity: usize,

    /// Timeout for the outbound Slack request in milliseconds
    pub relay_timeout_ms: u64,

    /// Username shown on relayed messages
    pub slack_username: String,

    /// Icon URL shown on relayed messages
    pub slack_icon_url: Option<String>,

    /// Optional channel override
    pub slack_channel: Option<String>,

    /// Optional emoji icon override
    pub slack_icon_emoji: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mailgun_key: None,
            slack_webhook_url: None,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            signature_max_skew_secs: 300, // 5 minutes
            replay_cache_capacity: 10_000,
            relay_timeout_ms: 5000,
            slack_username: DEFAULT_USERNAME.to_string(),
            slack_icon_url: Some(DEFAULT_ICON_URL.to_string()),
            slack_channel: None,
            slack_icon_emoji: None,
        }
    }
}

// The signing key must never reach the logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("mailgun_key", &self.mailgun_key.as_ref().map(|_| "<redacted>"))
            .field("slack_webhook_url", &self.destination_host())
            .field("bind_addr", &self.bind_addr)
            .field("port", &self.port)
            .field("signature_max_skew_secs", &self.signature_max_skew_secs)
            .field("replay_cache_capacity", &self.replay_cache_capacity)
            .field("relay_timeout_ms", &self.relay_timeout_ms)
            .field("slack_username", &self.slack_username)
            .field("slack_icon_url", &self.slack_icon_url)
            .field("slack_channel", &self.slack_channel)
            .field("slack_icon_emoji", &self.slack_icon_emoji)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            mailgun_key: non_empty("MAILGUN_KEY").or_else(|| non_empty("MAILGUN_SIGNING_KEY")),

            slack_webhook_url: non_empty("SLACK_WEBHOOK_URL"),

            bind_addr: parse_or("BIND_ADDR", defaults.bind_addr),

            port: parse_or("PORT", defaults.port),

            signature_max_skew_secs: parse_or(
                "SIGNATURE_MAX_SKEW_SECS",
                defaults.signature_max_skew_secs,
            ),

            replay_cache_capacity: parse_or("REPLAY_CACHE_CAPACITY", defaults.replay_cache_capacity),

            relay_timeout_ms: parse_or("RELAY_TIMEOUT_MS", defaults.relay_timeout_ms),

            slack_username: non_empty("SLACK_USERNAME").unwrap_or(defaults.slack_username),

            slack_icon_url: non_empty("SLACK_ICON_URL").or(defaults.slack_icon_url),

            slack_channel: non_empty("SLACK_CHANNEL"),

            slack_icon_emoji: non_empty("SLACK_ICON_EMOJI"),
        }
    }

    /// Parsed relay destination. Missing or malformed URLs are startup errors.
    pub fn destination(&self) -> Result<Url> {
        let raw = self
            .slack_webhook_url
            .as_deref()
            .ok_or_else(|| anyhow!("SLACK_WEBHOOK_URL is not set"))?;

        let url = Url::parse(raw).context("SLACK_WEBHOOK_URL is not a valid URL")?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(anyhow!("SLACK_WEBHOOK_URL has unsupported scheme {other:?}")),
        }
    }

    /// Host of the relay destination, safe to log.
    ///
    /// Slack webhook paths embed a secret, so only the host is ever exposed.
    pub fn destination_host(&self) -> Option<String> {
        self.slack_webhook_url
            .as_deref()
            .and_then(|raw| Url::parse(raw).ok())
            .and_then(|url| url.host_str().map(str::to_string))
    }

    pub fn signature_max_skew(&self) -> Duration {
        Duration::from_secs(self.signature_max_skew_secs)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }
}

/// Parse an environment variable, keeping the default when unset or invalid.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Read a trimmed, non-empty string variable.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_valid() {
        env::set_var("SLACKMAIL_TEST_PORT", "9001");
        let result: u16 = parse_or("SLACKMAIL_TEST_PORT", 8000);
        assert_eq!(result, 9001);
        env::remove_var("SLACKMAIL_TEST_PORT");
    }

    #[test]
    fn test_parse_or_invalid_uses_default() {
        env::set_var("SLACKMAIL_TEST_SKEW", "five minutes");
        let result: u64 = parse_or("SLACKMAIL_TEST_SKEW", 300);
        assert_eq!(result, 300);
        env::remove_var("SLACKMAIL_TEST_SKEW");
    }

    #[test]
    fn test_parse_or_missing_uses_default() {
        let result: usize = parse_or("SLACKMAIL_NONEXISTENT_VAR", 42);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_non_empty_ignores_blank() {
        env::set_var("SLACKMAIL_TEST_BLANK", "   ");
        assert_eq!(non_empty("SLACKMAIL_TEST_BLANK"), None);
        env::set_var("SLACKMAIL_TEST_BLANK", " #alerts ");
        assert_eq!(non_empty("SLACKMAIL_TEST_BLANK"), Some("#alerts".to_string()));
        env::remove_var("SLACKMAIL_TEST_BLANK");
    }

    #[test]
    fn test_destination_requires_http_url() {
        let mut config = Config::default();
        assert!(config.destination().is_err());

        config.slack_webhook_url = Some("ftp://hooks.slack.com/services/x".to_string());
        assert!(config.destination().is_err());

        config.slack_webhook_url = Some("not a url".to_string());
        assert!(config.destination().is_err());

        config.slack_webhook_url = Some("https://hooks.slack.com/services/T0/B0/secret".to_string());
        assert_eq!(
            config.destination().unwrap().as_str(),
            "https://hooks.slack.com/services/T0/B0/secret"
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config {
            mailgun_key: Some("key-super-secret".to_string()),
            slack_webhook_url: Some("https://hooks.slack.com/services/T0/B0/secret".to_string()),
            ..Config::default()
        };

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("key-super-secret"));
        assert!(!rendered.contains("/services/"));
        assert!(rendered.contains("hooks.slack.com"));
    }
}
