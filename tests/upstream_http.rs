use std::time::Duration;

use gateway::upstream::{HttpUpstream, UpstreamClient};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn upstream_for(server: &MockServer) -> HttpUpstream {
    HttpUpstream::new(&format!("{}/api/", server.uri()), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn successful_fetch_returns_raw_payload() {
    let server = MockServer::start().await;
    let body = json!({"id": 2, "name": "Morty Smith"});
    Mock::given(method("GET"))
        .and(path("/api/character/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let payload = upstream_for(&server).fetch("character/2").await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(parsed, body);
}

#[tokio::test]
async fn error_status_is_reported_with_upstream_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/character/9999"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "Character not found"})),
        )
        .mount(&server)
        .await;

    let err = upstream_for(&server)
        .fetch("character/9999")
        .await
        .unwrap_err();
    assert_eq!(err.status_code, Some(404));
    assert_eq!(err.message, "Character not found");
}

#[tokio::test]
async fn error_without_json_body_uses_reason_phrase() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/character"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = upstream_for(&server).fetch("character").await.unwrap_err();
    assert_eq!(err.status_code, Some(503));
    assert_eq!(err.message, "Service Unavailable");
}

#[tokio::test]
async fn slow_upstream_times_out_as_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/character"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let upstream =
        HttpUpstream::new(&format!("{}/api/", server.uri()), Duration::from_millis(200)).unwrap();
    let err = upstream.fetch("character").await.unwrap_err();
    assert_eq!(err.status_code, None);
}

#[tokio::test]
async fn unreachable_upstream_is_transport_error() {
    // 端口 1 上通常没有服务
    let upstream = HttpUpstream::new("http://127.0.0.1:1/api/", Duration::from_secs(2)).unwrap();
    let err = upstream.fetch("character").await.unwrap_err();
    assert_eq!(err.status_code, None);
    assert!(!err.message.is_empty());
}
