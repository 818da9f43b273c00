//! Slack incoming webhook payload.

use serde::Serialize;

use crate::config::{Config, DEFAULT_ICON_URL, DEFAULT_USERNAME};

/// Format an email as the chat line posted to Slack.
pub fn format_message(from: &str, content: &str) -> String {
    format!("{} says, \"{}\"\n", from, content)
}

/// Fixed presentation of relayed messages: who posts them and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayIdentity {
    pub username: String,
    pub icon_url: Option<String>,
    pub channel: Option<String>,
    pub icon_emoji: Option<String>,
}

impl Default for RelayIdentity {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            icon_url: Some(DEFAULT_ICON_URL.to_string()),
            channel: None,
            icon_emoji: None,
        }
    }
}

impl RelayIdentity {
    pub fn from_config(config: &Config) -> Self {
        Self {
            username: config.slack_username.clone(),
            icon_url: config.slack_icon_url.clone(),
            channel: config.slack_channel.clone(),
            icon_emoji: config.slack_icon_emoji.clone(),
        }
    }
}

/// Data posted to Slack Incoming Webhooks.
#[derive(Debug, Clone, Serialize)]
pub struct Payload<'a> {
    pub text: String,
    pub username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<&'a str>,
}

impl<'a> Payload<'a> {
    pub fn new(identity: &'a RelayIdentity, from: &str, content: &str) -> Self {
        Self {
            text: format_message(from, content),
            username: &identity.username,
            channel: identity.channel.as_deref(),
            icon_url: identity.icon_url.as_deref(),
            icon_emoji: identity.icon_emoji.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_message() {
        assert_eq!(
            format_message("alice@example.com", "hello there"),
            "alice@example.com says, \"hello there\"\n"
        );
    }

    #[test]
    fn test_format_message_never_empty() {
        assert_eq!(format_message("", ""), " says, \"\"\n");
    }

    #[test]
    fn test_default_payload_omits_overrides() {
        let identity = RelayIdentity::default();
        let payload = Payload::new(&identity, "alice@example.com", "hello there");

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "text": "alice@example.com says, \"hello there\"\n",
                "username": "slackmail",
                "icon_url": DEFAULT_ICON_URL,
            })
        );
    }

    #[test]
    fn test_payload_with_overrides() {
        let identity = RelayIdentity {
            username: "mailbot".to_string(),
            icon_url: None,
            channel: Some("#inbox".to_string()),
            icon_emoji: Some(":email:".to_string()),
        };
        let payload = Payload::new(&identity, "bob@example.com", "hi");

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["username"], "mailbot");
        assert_eq!(value["channel"], "#inbox");
        assert_eq!(value["icon_emoji"], ":email:");
        assert!(value.get("icon_url").is_none());
    }

    #[test]
    fn test_identity_from_config() {
        let config = Config {
            slack_channel: Some("#support".to_string()),
            ..Config::default()
        };

        let identity = RelayIdentity::from_config(&config);
        assert_eq!(identity.username, DEFAULT_USERNAME);
        assert_eq!(identity.icon_url.as_deref(), Some(DEFAULT_ICON_URL));
        assert_eq!(identity.channel.as_deref(), Some("#support"));
        assert_eq!(identity.icon_emoji, None);
    }
}
