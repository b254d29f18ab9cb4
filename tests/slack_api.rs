//! Slack Web API calls against a mock server. Slack reports most failures
//! as HTTP 200 with `"ok": false`, so these exercise the body checks.

use botbridge::channels::{Channel, SlackChannel};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_channel(mock_url: &str) -> SlackChannel {
    SlackChannel::new("xoxb-TEST".into(), "xapp-TEST".into())
        .with_api_base(mock_url.to_string())
}

#[tokio::test]
async fn post_message_sends_bearer_token_and_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(header("authorization", "Bearer xoxb-TEST"))
        .and(body_partial_json(serde_json::json!({
            "channel": "C12345",
            "text": "hello"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "ts": "1234567890.123456"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let channel = test_channel(&server.uri());
    channel
        .send("hello", "C12345")
        .await
        .expect("post should succeed");
}

#[tokio::test]
async fn ok_false_is_an_error_even_with_http_200() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": false,
            "error": "channel_not_found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let channel = test_channel(&server.uri());
    let err = channel
        .send("hello", "C99999")
        .await
        .expect_err("ok=false should fail the send");
    assert!(
        err.to_string().contains("channel_not_found"),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn http_failure_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let channel = test_channel(&server.uri());
    let err = channel
        .send("hello", "C12345")
        .await
        .expect_err("503 should fail the send");
    assert!(err.to_string().contains("503"), "unexpected error: {err}");
}

#[tokio::test]
async fn health_check_uses_auth_test() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth.test"))
        .and(header("authorization", "Bearer xoxb-TEST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "user_id": "U0BOT"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let channel = test_channel(&server.uri());
    assert!(channel.health_check().await);
}

#[tokio::test]
async fn health_check_fails_when_auth_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth.test"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_auth"))
        .expect(1)
        .mount(&server)
        .await;

    let channel = test_channel(&server.uri());
    assert!(!channel.health_check().await);
}
