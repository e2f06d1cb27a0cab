#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use msgnotify::api::MessagesClient;
use msgnotify::error::{ApiError, ConfigError, Error as AppError};
use secrecy::SecretString;
use serde_json::json;
use tokio::time::timeout;
use url::Url;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(base: &MockServer) -> MessagesClient {
    MessagesClient::new(
        Url::parse(&base.uri()).expect("valid mock url"),
        None,
        Duration::from_secs(2),
        Duration::from_secs(1),
        true,
    )
    .expect("client")
}

async fn mount_count(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/messages/api/unread-count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn snapshot_joins_both_endpoints() {
    let server = MockServer::start().await;
    mount_count(&server, json!({ "count": 3 })).await;
    Mock::given(method("GET"))
        .and(path("/messages/api/latest-messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [
                { "id": 42, "sender": "dmitri", "content": "Привет!", "sent_at": "01.05.2024 10:00" },
                { "id": 40, "sender": "olga", "content": "see you", "sent_at": "30.04.2024 18:12" }
            ]
        })))
        .mount(&server)
        .await;

    let snapshot = client(&server).snapshot().await.expect("snapshot");
    assert_eq!(snapshot.unread.count, 3);
    assert_eq!(snapshot.latest.messages.len(), 2);
    assert_eq!(snapshot.latest.latest().unwrap().sender, "dmitri");
    assert_eq!(snapshot.latest.max_id(), Some(42));
}

#[tokio::test]
async fn requests_carry_cookie_and_correlation_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/messages/api/unread-count"))
        .and(header("cookie", "session=s3cr3t"))
        .and(header_exists("x-correlation-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 0 })))
        .expect(1)
        .mount(&server)
        .await;

    let client = MessagesClient::new(
        Url::parse(&server.uri()).unwrap(),
        Some(SecretString::from("session=s3cr3t")),
        Duration::from_secs(2),
        Duration::from_secs(1),
        true,
    )
    .unwrap();

    let count = client.unread_count().await.expect("count");
    assert_eq!(count.count, 0);
}

#[tokio::test]
async fn one_failing_endpoint_fails_the_snapshot() {
    let server = MockServer::start().await;
    mount_count(&server, json!({ "count": 1 })).await;
    Mock::given(method("GET"))
        .and(path("/messages/api/latest-messages"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).snapshot().await.expect_err("should fail");
    match err {
        AppError::Api(ApiError::HttpStatus { status }) => assert_eq!(status.as_u16(), 503),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn login_page_instead_of_json_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/messages/api/unread-count"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>\n<form>login</form>"))
        .mount(&server)
        .await;

    let err = client(&server).unread_count().await.expect_err("should fail");
    match err {
        AppError::Api(ApiError::Json { message }) => {
            assert!(message.contains("/messages/api/unread-count"));
            assert!(message.contains("<html>\\n<form>"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(
        AppError::Api(ApiError::Json {
            message: String::new()
        })
        .is_transient()
    );
}

#[tokio::test]
async fn plain_http_requires_insecure() {
    let err = MessagesClient::new(
        Url::parse("http://localhost:5000").unwrap(),
        None,
        Duration::from_secs(2),
        Duration::from_secs(1),
        false,
    )
    .err()
    .expect("http must be refused");
    assert!(matches!(
        err,
        AppError::Config(ConfigError::InvalidField {
            field: "server.url",
            ..
        })
    ));
}

#[tokio::test]
async fn endpoints_resolve_against_base() {
    let client = MessagesClient::new(
        Url::parse("https://forum.example.org/app/").unwrap(),
        None,
        Duration::from_secs(2),
        Duration::from_secs(1),
        false,
    )
    .unwrap();
    assert_eq!(
        client.endpoint("/messages/").unwrap().as_str(),
        "https://forum.example.org/messages/"
    );
}

#[tokio::test]
async fn timeouts_surface_as_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "count": 1 }))
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&server)
        .await;

    let client = MessagesClient::new(
        Url::parse(&server.uri()).unwrap(),
        None,
        Duration::from_millis(500),
        Duration::from_millis(200),
        true,
    )
    .unwrap();

    let res = timeout(Duration::from_secs(5), client.unread_count()).await;
    let err = res.expect("timeout future").expect_err("should fail");
    assert!(matches!(err, AppError::Api(ApiError::Request { .. })));
}
