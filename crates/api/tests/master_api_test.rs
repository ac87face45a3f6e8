use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use crawler_api::{create_app, create_routes, AppState};
use crawler_core::MasterConfig;
use crawler_dispatcher::{JobScheduler, SchedulerSettings};
use crawler_infrastructure::{InMemoryDocumentStore, MetricsCollector};

struct TestApp {
    address: String,
    scheduler: Arc<JobScheduler>,
    store: InMemoryDocumentStore,
    client: reqwest::Client,
    server: tokio::task::JoinHandle<()>,
}

impl TestApp {
    async fn spawn(seed_ids: &[&str]) -> TestApp {
        let store = InMemoryDocumentStore::new();
        let scheduler = Arc::new(JobScheduler::new(
            Arc::new(store.clone()),
            Arc::new(MetricsCollector::new()),
            SchedulerSettings::new(Duration::from_secs(300), "crawl"),
        ));
        let ids: Vec<String> = seed_ids.iter().map(|id| id.to_string()).collect();
        scheduler.seed(&ids).await;

        let config = MasterConfig {
            max_lease_count: 3,
            ..MasterConfig::default()
        };
        let app = create_app(AppState::new(scheduler.clone(), &config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestApp {
            address,
            scheduler,
            store,
            client: reqwest::Client::new(),
            server,
        }
    }

    async fn lease(&self, query: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/master/job{}", self.address, query))
            .send()
            .await
            .unwrap()
    }

    async fn complete(&self, body: Value) -> reqwest::Response {
        self.client
            .put(format!("{}/master/job", self.address))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
    }
}

#[tokio::test]
async fn test_lease_default_count() {
    let app = TestApp::spawn(&["42"]).await;

    let response = app.lease("").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!([{"type": 0, "id": "42"}]));
}

#[tokio::test]
async fn test_lease_count_is_capped() {
    let app = TestApp::spawn(&["1", "2", "3"]).await;

    let body: Value = app.lease("?count=50").await.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 3);

    let body: Value = app.lease("?count=2").await.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_lease_zero_is_bad_request() {
    let app = TestApp::spawn(&["42"]).await;

    let response = app.lease("?count=0").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "BAD_REQUEST");
    assert_eq!(body["error"]["code"], 400);
}

#[tokio::test]
async fn test_lease_invalid_count_is_bad_request() {
    let app = TestApp::spawn(&["42"]).await;
    let response = app.lease("?count=many").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_lease_empty_queue() {
    let app = TestApp::spawn(&[]).await;
    let body: Value = app.lease("?count=2").await.json().await.unwrap();
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_complete_persists_and_removes() {
    let app = TestApp::spawn(&["42"]).await;
    app.lease("?count=2").await;

    let response = app
        .complete(json!({
            "data": [
                {"type": 0, "id": "42", "username": "vine", "mentions": ["7"]},
                {"type": 1, "id": "42", "posts": []}
            ]
        }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(
        body["data"],
        json!({"persisted": 2, "removed": 2, "ignored": 0})
    );

    assert_eq!(app.store.write_log().await.len(), 2);
    let jobs = app.scheduler.jobs().await;
    let uids: Vec<&str> = jobs.iter().map(|job| job.uid()).collect();
    assert_eq!(uids, vec!["0-7", "1-7"]);
}

#[tokio::test]
async fn test_complete_store_failure_is_bad_gateway() {
    let app = TestApp::spawn(&["42"]).await;
    app.lease("").await;
    app.store.set_fail_all_puts(true).await;

    let response = app
        .complete(json!({"data": [{"type": 0, "id": "42"}]}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "STORE_ERROR");
    assert_eq!(app.scheduler.snapshot().await.pending, 1);
}

#[tokio::test]
async fn test_complete_rejects_invalid_job_type() {
    let app = TestApp::spawn(&["42"]).await;

    let response = app
        .complete(json!({"data": [{"type": 5, "id": "42"}]}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.write_log().await.is_empty());
}

#[tokio::test]
async fn test_status_reports_queue() {
    let app = TestApp::spawn(&["42", "43"]).await;
    app.lease("?count=1").await;

    let body: Value = app
        .client
        .get(format!("{}/master/status", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["data"]["total"], 4);
    assert_eq!(body["data"]["pending"], 1);
    assert_eq!(body["data"]["idle"], 3);
    assert_eq!(body["data"]["failed_jobs"], json!([]));
}

#[tokio::test]
async fn test_health_and_metrics_routes() {
    let scheduler = Arc::new(JobScheduler::new(
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(MetricsCollector::new()),
        SchedulerSettings::new(Duration::from_secs(300), "crawl"),
    ));
    let app = create_routes(AppState::new(scheduler, &MasterConfig::default()));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
