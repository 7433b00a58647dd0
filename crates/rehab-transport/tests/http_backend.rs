//! `HttpBackend` against a mock backend.

use std::time::Duration;

use rehab_core::{AgentBackend, traits::BackendError};
use rehab_transport::{EnvStatus, HttpBackend};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path, query_param},
};

fn backend(server: &MockServer) -> HttpBackend {
    HttpBackend::new(server.uri(), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_fetch_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/token"))
        .and(query_param("user_id", "patient-001"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token": "jwt", "api_key": "key"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let creds = assert_ok!(backend(&server).fetch_token("patient-001").await);
    assert_eq!(creds.token, "jwt");
    assert_eq!(creds.api_key, "key");
}

#[tokio::test]
async fn test_fetch_token_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "STREAM keys missing"})),
        )
        .mount(&server)
        .await;

    let err = backend(&server).fetch_token("patient-001").await.unwrap_err();
    match err {
        BackendError::Status { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("STREAM keys missing"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_fetch_token_rejects_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "jwt"})))
        .mount(&server)
        .await;

    let err = backend(&server).fetch_token("patient-001").await.unwrap_err();
    assert!(matches!(err, BackendError::Decode(_)));
}

#[tokio::test]
async fn test_start_agent_posts_call_and_exercise() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/start-agent"))
        .and(body_json(json!({"call_id": "rehab-abc", "exercise": "knee_bend"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "agent_launching", "call_id": "rehab-abc"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    assert_ok!(backend(&server).start_agent("rehab-abc", "knee_bend").await);
}

#[tokio::test]
async fn test_timeout_is_a_request_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/start-agent"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri(), Duration::from_millis(50)).unwrap();
    let err = assert_err!(backend.start_agent("rehab-abc", "slr").await);
    assert!(matches!(err, BackendError::Request(_)));
}

#[tokio::test]
async fn test_unreachable_backend() {
    let backend = HttpBackend::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
    let err = assert_err!(backend.fetch_token("patient-001").await);
    assert!(matches!(err, BackendError::Request(_)));
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "env": {"STREAM_API_KEY": "SET", "DEEPGRAM_API_KEY": "MISSING"}
        })))
        .mount(&server)
        .await;

    let health = assert_ok!(backend(&server).health().await);
    assert_eq!(health.status, "ok");
    assert_eq!(health.env["STREAM_API_KEY"], EnvStatus::Set);
    assert_eq!(health.env["DEEPGRAM_API_KEY"], EnvStatus::Missing);
}
