//! HttpRegistryQueue Tests
//!
//! Tests for:
//! - Session login/logout and bearer auth
//! - API key auth without a session
//! - Next-message parsing and object type filtering
//! - Acknowledgment and detail fetch
//! - Vendor error propagation
//! - Percent-encoding of vendor ids in resource paths

use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rn_config::HttpQueueSettings;
use rn_queue::{HttpRegistryQueue, QueueError, RegistryQueueClient};

fn settings(base_url: &str) -> HttpQueueSettings {
    HttpQueueSettings {
        base_url: base_url.to_string(),
        api_key: "key-123".to_string(),
        ..Default::default()
    }
}

fn session_settings(base_url: &str) -> HttpQueueSettings {
    HttpQueueSettings {
        base_url: base_url.to_string(),
        username: "reseller".to_string(),
        password: "secret".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_fetch_next_with_api_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/messages/next"))
        .and(query_param("object_type", "domain"))
        .and(header("X-Api-Key", "key-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "message": {
                "id": "msg-1",
                "type": "TRANSFER_IN",
                "text": "Inbound transfer completed",
                "domains": ["example.com"],
                "orderId": "ord-7",
                "createdAt": "2024-01-10T00:00:00Z"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let queue = HttpRegistryQueue::new("vendor", &settings(&mock_server.uri())).unwrap();
    let outcome = queue.fetch_next().await.unwrap();

    assert_eq!(outcome.queue_size, 2);
    let envelope = outcome.envelope.unwrap();
    assert_eq!(envelope.id.as_deref(), Some("msg-1"));
    assert_eq!(envelope.raw_type, "TRANSFER_IN");
    assert_eq!(envelope.raw_text, "Inbound transfer completed");
    assert_eq!(envelope.domain_names, vec!["example.com".to_string()]);
    assert_eq!(envelope.detail_ref.as_deref(), Some("ord-7"));
    assert_eq!(
        envelope.approx_timestamp,
        Some(Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_session_lifecycle() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .and(body_json(json!({ "username": "reseller", "password": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-1" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/messages/next"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 0, "message": null })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/session"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let queue = HttpRegistryQueue::new("vendor", &session_settings(&mock_server.uri())).unwrap();
    queue.connect().await.unwrap();
    // Second connect reuses the open session
    queue.connect().await.unwrap();
    assert!(queue.is_connected());

    let outcome = queue.fetch_next().await.unwrap();
    assert!(outcome.is_empty());

    queue.disconnect().await.unwrap();
    assert!(!queue.is_connected());
    // Disconnect without a session is a no-op
    queue.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_session_required_before_fetch() {
    let mock_server = MockServer::start().await;
    let queue = HttpRegistryQueue::new("vendor", &session_settings(&mock_server.uri())).unwrap();

    let result = queue.fetch_next().await;
    assert!(matches!(result, Err(QueueError::NotConnected)));
}

#[tokio::test]
async fn test_login_without_token_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&mock_server)
        .await;

    let queue = HttpRegistryQueue::new("vendor", &session_settings(&mock_server.uri())).unwrap();
    let result = queue.connect().await;
    assert!(matches!(result, Err(QueueError::Protocol { status: 200, .. })));
    assert!(!queue.is_connected());
}

#[tokio::test]
async fn test_ack_and_detail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/messages/msg-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/details/ord-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "order": { "id": "ord-7", "completedAt": "2024-01-12T15:30:00Z" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let queue = HttpRegistryQueue::new("vendor", &settings(&mock_server.uri())).unwrap();
    queue.ack("msg-1").await.unwrap();

    let detail = queue.fetch_detail("ord-7").await.unwrap();
    assert_eq!(detail.timestamp, Utc.with_ymd_and_hms(2024, 1, 12, 15, 30, 0).unwrap());
    assert!(detail.extra.is_some());
}

#[tokio::test]
async fn test_ack_and_detail_keep_opaque_ids_in_one_segment() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/details/ord%2F7%3Fx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "timestamp": "2024-01-12T15:30:00Z" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let queue = HttpRegistryQueue::new("vendor", &settings(&mock_server.uri())).unwrap();
    queue.ack("msg#1").await.unwrap();
    queue.ack("a/b").await.unwrap();
    queue.ack("two words").await.unwrap();
    queue.fetch_detail("ord/7?x").await.unwrap();

    let deleted: Vec<String> = mock_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "DELETE")
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(
        deleted,
        vec!["/messages/msg%231", "/messages/a%2Fb", "/messages/two%20words"]
    );
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/messages/next"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let queue = HttpRegistryQueue::new("vendor", &settings(&mock_server.uri())).unwrap();
    assert!(matches!(queue.fetch_next().await, Err(QueueError::Decode(_))));
}

#[tokio::test]
async fn test_vendor_errors_surface_status_and_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/messages/msg-9"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "message": "queue locked" })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/details/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let queue = HttpRegistryQueue::new("vendor", &settings(&mock_server.uri())).unwrap();

    match queue.ack("msg-9").await {
        Err(QueueError::Protocol { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "queue locked");
        }
        other => panic!("expected protocol error, got {:?}", other),
    }

    assert!(matches!(
        queue.fetch_detail("missing").await,
        Err(QueueError::Protocol { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_custom_paths() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/poll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "queueSize": 0 })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = settings(&format!("{}/", mock_server.uri()));
    config.next_message_path = "/v2/poll".to_string();
    config.object_type = String::new();

    let queue = HttpRegistryQueue::new("vendor", &config).unwrap();
    assert!(queue.fetch_next().await.unwrap().is_empty());
}

#[test]
fn test_missing_base_url_rejected() {
    let result = HttpRegistryQueue::new("vendor", &HttpQueueSettings::default());
    assert!(matches!(result, Err(QueueError::Config(_))));
}
