use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use counter_common::{Count, PageId, ShardId};
use counter_core::{CounterService, ShardRouter};

/// In-memory fake backend, mirroring the one used by `counter-core`'s own
/// service tests, so the HTTP layer can be exercised end to end without a
/// real Redis-compatible shard.
struct FakeBackend {
    counts: tokio::sync::Mutex<HashMap<PageId, Count>>,
}

#[async_trait::async_trait]
impl ShardRouter for FakeBackend {
    fn shard_for(&self, _key: &PageId) -> ShardId {
        ShardId::new("fake-shard")
    }

    async fn incr_by(&self, key: &PageId, delta: Count) -> counter_client::ClientResult<Count> {
        let mut counts = self.counts.lock().await;
        let entry = counts.entry(key.clone()).or_insert(0);
        *entry += delta;
        Ok(*entry)
    }

    async fn get_with_tag(
        &self,
        key: &PageId,
    ) -> counter_client::ClientResult<(Count, String)> {
        let counts = self.counts.lock().await;
        Ok((counts.get(key).copied().unwrap_or(0), "fake-shard".to_string()))
    }
}

fn test_app() -> axum::Router {
    let backend = Arc::new(FakeBackend {
        counts: tokio::sync::Mutex::new(HashMap::new()),
    });
    let service = Arc::new(CounterService::new(
        backend,
        Duration::from_secs(5),
        Duration::from_secs(30),
    ));
    counter_server::build_router(service)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn visit_then_read_within_ttl_is_served_in_memory() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/visit/p1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/visits/p1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["visits"], 1);
    assert_eq!(body["served_via"], "in_memory");
}

#[tokio::test]
async fn manual_flush_empties_the_buffer() {
    let app = test_app();

    for _ in 0..5 {
        app.clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/visit/p2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/flush")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/buffer")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["buffer_size"], 0);
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = test_app();

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}
