//! `HttpTransport` against a mock API server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use nexus_client::{
    CancellationToken, HttpTransport, NoAuth, RefreshableToken, RequestDescriptor, StaticToken,
    TokenSource, Transport, TransportConfig, TransportError,
};
use nexus_common::HttpMethod;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer, tokens: Arc<dyn TokenSource>) -> HttpTransport {
    let config = TransportConfig::new(&server.uri())
        .unwrap()
        .with_header("X-Client", "nexus-tests");
    HttpTransport::new(config, tokens).unwrap()
}

fn refreshing(calls: Arc<AtomicUsize>) -> Arc<RefreshableToken> {
    Arc::new(RefreshableToken::new(Some("stale".into()), move || {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok("fresh".to_string())
        }
    }))
}

#[tokio::test]
async fn test_injects_headers_token_query_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/a1/workspaces"))
        .and(query_param("dryRun", "true"))
        .and(header("authorization", "Bearer t1"))
        .and(header("x-client", "nexus-tests"))
        .and(header("x-request-id", "req-7"))
        .and(body_json(json!({"workspace_name": "Roadmap"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"workspace_id": "w1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport(&server, Arc::new(StaticToken::new("t1")));
    let request = RequestDescriptor::new(HttpMethod::Post, "/accounts/a1/workspaces")
        .with_query("dryRun", "true")
        .with_header("X-Request-Id", "req-7")
        .with_body(json!({"workspace_name": "Roadmap"}));

    let body = transport
        .send(request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(body, json!({"workspace_id": "w1"}));
}

#[tokio::test]
async fn test_empty_bodies_decode_to_null() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/workspaces/w1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/workspaces/w1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let transport = transport(&server, Arc::new(NoAuth));
    let cancel = CancellationToken::new();
    for method in [HttpMethod::Delete, HttpMethod::Put] {
        let value = transport
            .send(RequestDescriptor::new(method, "/workspaces/w1"), &cancel)
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }
}

#[tokio::test]
async fn test_error_taxonomy() {
    let server = MockServer::start().await;
    Mock::given(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;
    Mock::given(path("/failing"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream timeout"))
        .mount(&server)
        .await;

    let transport = transport(&server, Arc::new(NoAuth));
    let cancel = CancellationToken::new();

    let err = transport
        .send(RequestDescriptor::new(HttpMethod::Get, "/broken"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)), "{err:?}");

    let err = transport
        .send(RequestDescriptor::new(HttpMethod::Get, "/failing"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransportError::HttpStatus {
            status: 500,
            body: "upstream timeout".into()
        }
    );

    let unreachable = HttpTransport::new(
        TransportConfig::new("http://127.0.0.1:9").unwrap(),
        Arc::new(NoAuth),
    )
    .unwrap();
    let err = unreachable
        .send(RequestDescriptor::new(HttpMethod::Get, "/health"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Network(_)), "{err:?}");
}

#[tokio::test]
async fn test_concurrent_401s_refresh_once() {
    let server = MockServer::start().await;
    Mock::given(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1..=3)
        .mount(&server)
        .await;
    Mock::given(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(3)
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let transport = transport(&server, refreshing(Arc::clone(&calls)));
    let cancel = CancellationToken::new();
    let send = |p: &'static str| transport.send(RequestDescriptor::new(HttpMethod::Get, p), &cancel);

    let (a, b, c) = tokio::join!(send("/a"), send("/b"), send("/c"));
    for result in [a, b, c] {
        assert_eq!(result.unwrap(), json!({"ok": true}));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_401_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("session revoked"))
        .expect(2)
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let transport = transport(&server, refreshing(Arc::clone(&calls)));
    let err = transport
        .send(
            RequestDescriptor::new(HttpMethod::Get, "/accounts/a1"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_static_token_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport(&server, Arc::new(StaticToken::new("t1")));
    let err = transport
        .send(
            RequestDescriptor::new(HttpMethod::Get, "/accounts/a1"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_cancellation_aborts_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let transport = transport(&server, Arc::new(NoAuth));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = transport
        .send(RequestDescriptor::new(HttpMethod::Get, "/slow"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(2));
}
