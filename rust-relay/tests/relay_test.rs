//! Tests for the outbound Slack relay against a mock destination.

use std::time::Duration;

use url::Url;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use slackmail::{RelayError, RelayIdentity, SlackRelay};

fn relay(server: &MockServer, timeout: Duration, identity: RelayIdentity) -> SlackRelay {
    let destination = Url::parse(&format!("{}/hook", server.uri())).unwrap();
    SlackRelay::new(destination, timeout, identity).unwrap()
}

#[tokio::test]
async fn test_relay_posts_single_payload_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let identity = RelayIdentity {
        channel: Some("#inbox".to_string()),
        icon_emoji: Some(":incoming_envelope:".to_string()),
        ..RelayIdentity::default()
    };
    let relay = relay(&server, Duration::from_secs(5), identity);

    relay
        .relay("bob@example.com", "lunch at noon?")
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let fields: Vec<(String, String)> = url::form_urlencoded::parse(&requests[0].body)
        .into_owned()
        .collect();
    assert_eq!(fields.len(), 1);

    let payload: serde_json::Value = serde_json::from_str(&fields[0].1).unwrap();
    assert_eq!(payload["text"], "bob@example.com says, \"lunch at noon?\"\n");
    assert_eq!(payload["channel"], "#inbox");
    assert_eq!(payload["icon_emoji"], ":incoming_envelope:");
}

#[tokio::test]
async fn test_relay_error_status_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no_service"))
        .mount(&server)
        .await;

    let relay = relay(&server, Duration::from_secs(5), RelayIdentity::default());

    match relay.relay("bob@example.com", "hi").await {
        Err(RelayError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert_eq!(body, "no_service");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_relay_repeated_500s_with_large_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(64 * 1024)))
        .expect(20)
        .mount(&server)
        .await;

    let relay = relay(&server, Duration::from_secs(5), RelayIdentity::default());

    for _ in 0..20 {
        let err = relay.relay("bob@example.com", "hi").await.unwrap_err();
        match err {
            RelayError::Status { status, body } => {
                assert_eq!(status, 500);
                // Only a prefix of the drained body is kept.
                assert_eq!(body.len(), 256);
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_relay_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let relay = relay(&server, Duration::from_millis(100), RelayIdentity::default());

    match relay.relay("bob@example.com", "hi").await {
        Err(RelayError::Timeout { timeout_ms }) => assert_eq!(timeout_ms, 100),
        other => panic!("expected timeout, got {:?}", other),
    }
}
