use super::*;
use crate::config::{OpenAiConfig, PromptConfig, VectorStoreConfig};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
struct Echo {
    ok: bool,
}

fn client_for(server: &MockServer, api_key: Option<&str>) -> OpenAiClient {
    let base_url = Url::parse(&format!("{}/v1/", server.uri())).expect("mock uri should parse");
    OpenAiClient::with_base_url(base_url, api_key.map(str::to_string))
}

#[test]
fn client_configuration() {
    let config = Config {
        openai: OpenAiConfig {
            base_url: "http://test-host:1234/v1".to_string(),
            api_key: Some("sk-test".to_string()),
            ..OpenAiConfig::default()
        },
        vector_store: VectorStoreConfig::default(),
        prompt: PromptConfig::default(),
        base_dir: PathBuf::new(),
    };
    let client = OpenAiClient::new(&config).expect("Failed to create client");

    assert_eq!(client.base_url().host_str(), Some("test-host"));
    assert_eq!(client.base_url().port(), Some(1234));
    assert_eq!(client.base_url().path(), "/v1/");
    assert_eq!(client.api_key.as_deref(), Some("sk-test"));
}

#[test]
fn invalid_base_url_is_a_config_error() {
    let config = Config {
        openai: OpenAiConfig {
            base_url: "not a url".to_string(),
            ..OpenAiConfig::default()
        },
        vector_store: VectorStoreConfig::default(),
        prompt: PromptConfig::default(),
        base_dir: PathBuf::new(),
    };
    assert!(matches!(
        OpenAiClient::new(&config),
        Err(MnemosyneError::Config(_))
    ));
}

#[test]
fn status_codes_are_classified() {
    let cases = [
        (401, RemoteErrorKind::Authentication),
        (403, RemoteErrorKind::Authentication),
        (429, RemoteErrorKind::RateLimited),
        (500, RemoteErrorKind::Server),
        (503, RemoteErrorKind::Server),
        (400, RemoteErrorKind::InvalidResponse),
        (404, RemoteErrorKind::InvalidResponse),
    ];

    for (status, expected) in cases {
        let error = classify_error(ureq::Error::StatusCode(status));
        assert_eq!(error.kind, expected, "status {status}");
    }
}

#[test]
fn transport_failures_are_network_errors() {
    let error = classify_error(ureq::Error::ConnectionFailed);
    assert_eq!(error.kind, RemoteErrorKind::Network);
    assert!(error.kind.is_transient());
}

#[tokio::test]
async fn post_json_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/echo"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("sk-test"));
    let echo: Echo = client
        .post_json("echo", &json!({ "hello": "world" }))
        .await
        .expect("request should succeed");

    assert!(echo.ok);
}

#[tokio::test]
async fn missing_api_key_fails_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let result: Result<Echo, RemoteError> = client.post_json("echo", &json!({})).await;

    let error = result.expect_err("request without a key should fail");
    assert_eq!(error.kind, RemoteErrorKind::Authentication);
}

#[tokio::test]
async fn unparseable_body_is_an_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/echo"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("sk-test"));
    let result: Result<Echo, RemoteError> = client.post_json("echo", &json!({})).await;

    let error = result.expect_err("garbage body should fail");
    assert_eq!(error.kind, RemoteErrorKind::InvalidResponse);
}

#[tokio::test]
async fn short_timeout_is_a_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/echo"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Some("sk-test")).with_timeout(Duration::from_millis(200));
    let result: Result<Echo, RemoteError> = client.post_json("echo", &json!({})).await;

    let error = result.expect_err("slow response should time out");
    assert_eq!(error.kind, RemoteErrorKind::Network);
}
