//! Query client behaviour over HTTP: pagination, failures, invalidation,
//! coalescing and cancellation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use nexus_client::{
    CacheKey, CancellationToken, HttpTransport, NoAuth, PageOutcome, PageState, QueryClient,
    QueryState, RetryPolicy, TransportConfig, TransportError,
};
use nexus_common::{Endpoint, EndpointManifest};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// The manifest the generator writes for a minimal workspaces domain.
const MANIFEST: &str = r#"{
  "domain": "workspaces",
  "endpoints": [
    {
      "key": { "domain": "workspaces", "tag": "workspaces", "operation": "listWorkspaces" },
      "method": "GET",
      "path": "/workspaces",
      "role": "infinite-query",
      "params": [
        { "name": "limit", "location": "query", "required": false },
        { "name": "nextPageToken", "location": "query", "required": false }
      ],
      "hasBody": false,
      "cursorParam": "nextPageToken",
      "cursorField": "nextPageToken"
    },
    {
      "key": { "domain": "workspaces", "tag": "workspaces", "operation": "getWorkspace" },
      "method": "GET",
      "path": "/workspaces/{workspaceId}",
      "role": "query",
      "params": [{ "name": "workspaceId", "location": "path", "required": true }],
      "hasBody": false
    },
    {
      "key": { "domain": "workspaces", "tag": "workspaces", "operation": "createWorkspace" },
      "method": "POST",
      "path": "/workspaces",
      "role": "mutation",
      "params": [],
      "hasBody": true
    },
    {
      "key": { "domain": "workspaces", "tag": "workspace roles", "operation": "listWorkspaceRoles" },
      "method": "GET",
      "path": "/workspaces/{workspaceId}/users/roles",
      "role": "query",
      "params": [{ "name": "workspaceId", "location": "path", "required": true }],
      "hasBody": false
    }
  ]
}"#;

struct Harness {
    server: MockServer,
    client: QueryClient,
    manifest: EndpointManifest,
}

impl Harness {
    async fn start() -> Self {
        Self::with_retry(RetryPolicy::none()).await
    }

    async fn with_retry(retry: RetryPolicy) -> Self {
        let server = MockServer::start().await;
        let transport = HttpTransport::new(
            TransportConfig::new(&server.uri()).unwrap(),
            Arc::new(NoAuth),
        )
        .unwrap();
        Self {
            client: QueryClient::with_retry(Arc::new(transport), retry),
            manifest: EndpointManifest::from_json(MANIFEST).unwrap(),
            server,
        }
    }

    fn endpoint(&self, operation: &str) -> &Endpoint {
        self.manifest.get(operation).unwrap()
    }

    async fn requests(&self) -> usize {
        self.server.received_requests().await.unwrap().len()
    }
}

fn page(ids: &[&str], next: Value) -> ResponseTemplate {
    let workspaces: Vec<Value> = ids.iter().map(|id| json!({"workspace_id": id})).collect();
    ResponseTemplate::new(200)
        .set_body_json(json!({"workspaces": workspaces, "nextPageToken": next}))
}

#[tokio::test]
async fn test_cursor_pagination_until_exhausted() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .and(query_param_is_missing("nextPageToken"))
        .respond_with(page(&["w1", "w2"], json!("abc")))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .and(query_param("nextPageToken", "abc"))
        .respond_with(page(&["w3"], Value::Null))
        .expect(1)
        .mount(&h.server)
        .await;

    let list = h
        .client
        .infinite_query(h.endpoint("listWorkspaces"), &json!({}))
        .unwrap();
    let cancel = CancellationToken::new();
    assert_eq!(list.state(), PageState::Idle);

    let first = list.fetch_next_page(&cancel).await.unwrap();
    assert!(matches!(first, PageOutcome::Page { index: 0, .. }));
    assert_eq!(
        list.state(),
        PageState::HasPages {
            next_cursor: Some("abc".into())
        }
    );

    let second = list.fetch_next_page(&cancel).await.unwrap();
    let PageOutcome::Page { index, data } = second else {
        panic!("expected a page");
    };
    assert_eq!(index, 1);
    assert_eq!(data["workspaces"][0]["workspace_id"], "w3");
    assert!(!list.has_next_page());

    assert_eq!(list.fetch_next_page(&cancel).await.unwrap(), PageOutcome::Exhausted);
    assert_eq!(list.pages().len(), 2);
    assert_eq!(h.requests().await, 2);
}

#[tokio::test]
async fn test_not_found_is_failed_state() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "Workspace not found"})),
        )
        .mount(&h.server)
        .await;

    let endpoint = h.endpoint("getWorkspace");
    let params = json!({"workspaceId": "missing"});
    let err = h
        .client
        .query(endpoint, &params, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));

    let state = h.client.state(&CacheKey::for_endpoint(endpoint, &params));
    assert!(matches!(
        state,
        QueryState::Failed(TransportError::HttpStatus { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_mutation_invalidates_its_tag() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces/w1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"workspace_id": "w1"})))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .respond_with(page(&["w1"], Value::Null))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/workspaces/w1/users/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/workspaces"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"workspace_id": "w2"})))
        .expect(1)
        .mount(&h.server)
        .await;

    let cancel = CancellationToken::new();
    let get = h.endpoint("getWorkspace");
    let roles = h.endpoint("listWorkspaceRoles");
    let params = json!({"workspaceId": "w1"});
    let list = h
        .client
        .infinite_query(h.endpoint("listWorkspaces"), &Value::Null)
        .unwrap();

    h.client.query(get, &params, &cancel).await.unwrap();
    h.client.query(roles, &params, &cancel).await.unwrap();
    list.fetch_next_page(&cancel).await.unwrap();
    assert_eq!(list.fetch_next_page(&cancel).await.unwrap(), PageOutcome::Exhausted);
    // Cached: no request.
    h.client.query(get, &params, &cancel).await.unwrap();

    let created = h
        .client
        .mutate(
            h.endpoint("createWorkspace"),
            &Value::Null,
            Some(json!({"workspace_name": "Roadmap"})),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(created["workspace_id"], "w2");

    assert!(h.client.is_stale(&CacheKey::for_endpoint(get, &params)));
    assert!(!h.client.is_stale(&CacheKey::for_endpoint(roles, &params)));
    assert_eq!(list.state(), PageState::Idle);

    h.client.query(get, &params, &cancel).await.unwrap();
    h.client.query(roles, &params, &cancel).await.unwrap();
    assert!(matches!(
        list.fetch_next_page(&cancel).await.unwrap(),
        PageOutcome::Page { index: 0, .. }
    ));
}

#[tokio::test]
async fn test_concurrent_reads_coalesce() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces/w1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"workspace_id": "w1"}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .respond_with(page(&["w1"], json!("next")).set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&h.server)
        .await;

    let cancel = CancellationToken::new();
    let get = h.endpoint("getWorkspace");
    let a = json!({"workspaceId": "w1"});
    let (x, y) = tokio::join!(
        h.client.query(get, &a, &cancel),
        h.client.query(get, &a, &cancel),
    );
    assert_eq!(x.unwrap(), y.unwrap());

    let list = h.endpoint("listWorkspaces");
    let one = h.client.infinite_query(list, &json!({"limit": 20})).unwrap();
    let two = h.client.infinite_query(list, &json!({"limit": 20})).unwrap();
    let (p, q) = tokio::join!(one.fetch_next_page(&cancel), two.fetch_next_page(&cancel));
    assert_eq!(p.unwrap(), q.unwrap());
    assert_eq!(one.pages().len(), 1);
    assert_eq!(two.pages().len(), 1);
}

#[tokio::test]
async fn test_cancel_queries_aborts_without_writing() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&h.server)
        .await;

    let get = h.endpoint("getWorkspace");
    let params = json!({"workspaceId": "w1"});
    let cancel = CancellationToken::new();

    let (result, cancelled) = tokio::join!(h.client.query(get, &params, &cancel), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.client.cancel_queries("workspaces", "workspaces")
    });
    assert_eq!(cancelled, 1);
    assert_eq!(result, Err(TransportError::Cancelled));
    assert!(h.client.state(&CacheKey::for_endpoint(get, &params)).is_pending());

    let list = h
        .client
        .infinite_query(h.endpoint("listWorkspaces"), &json!({}))
        .unwrap();
    let (result, cancelled) = tokio::join!(list.fetch_next_page(&cancel), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        list.cancel()
    });
    assert!(cancelled);
    assert_eq!(result, Err(TransportError::Cancelled));
    assert_eq!(list.state(), PageState::Idle);
    assert!(list.query_state().is_pending());
}

#[tokio::test]
async fn test_failed_page_keeps_cursor() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .and(query_param_is_missing("nextPageToken"))
        .respond_with(page(&["w1"], json!("abc")))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .and(query_param("nextPageToken", "abc"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .and(query_param("nextPageToken", "abc"))
        .respond_with(page(&["w2"], Value::Null))
        .mount(&h.server)
        .await;

    let cancel = CancellationToken::new();
    let list = h
        .client
        .infinite_query(h.endpoint("listWorkspaces"), &json!({}))
        .unwrap();
    list.fetch_next_page(&cancel).await.unwrap();

    let err = list.fetch_next_page(&cancel).await.unwrap_err();
    assert_eq!(err.status(), Some(502));
    assert_eq!(
        list.state(),
        PageState::HasPages {
            next_cursor: Some("abc".into())
        }
    );
    assert!(matches!(list.query_state(), QueryState::Failed(_)));

    let retried = list.fetch_next_page(&cancel).await.unwrap();
    assert!(matches!(retried, PageOutcome::Page { index: 1, .. }));
    assert!(matches!(list.query_state(), QueryState::Succeeded(pages) if pages.len() == 2));
}

#[tokio::test]
async fn test_retry_policy_is_opt_in() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;
    let err = h
        .client
        .query(
            h.endpoint("getWorkspace"),
            &json!({"workspaceId": "w1"}),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(h.requests().await, 1);

    let h = Harness::with_retry(RetryPolicy::exponential(3, Duration::from_millis(5))).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"workspace_id": "w1"})))
        .mount(&h.server)
        .await;
    let value = h
        .client
        .query(
            h.endpoint("getWorkspace"),
            &json!({"workspaceId": "w1"}),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(value["workspace_id"], "w1");
    assert_eq!(h.requests().await, 3);
}

#[tokio::test]
async fn test_invalid_invocations_send_nothing() {
    let h = Harness::start().await;
    let cancel = CancellationToken::new();

    let err = h
        .client
        .query(h.endpoint("getWorkspace"), &json!({}), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::InvalidRequest(_)));

    assert!(h
        .client
        .infinite_query(h.endpoint("getWorkspace"), &json!({}))
        .is_err());
    assert_eq!(h.requests().await, 0);
}
