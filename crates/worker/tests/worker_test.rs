use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crawler_api::{create_app, AppState};
use crawler_core::{CrawlerError, CrawlerResult, MasterConfig, WorkerConfig};
use crawler_dispatcher::{JobScheduler, SchedulerSettings};
use crawler_domain::{CompletedJobPayload, JobDescriptor, JobType};
use crawler_infrastructure::{InMemoryDocumentStore, MetricsCollector};
use crawler_worker::{CrawlWorker, HttpJsonFetcher, JobFetcher, MasterClient};

/// 资料任务成功，时间线任务按配置失败
struct StubFetcher {
    fail_timelines: bool,
}

#[async_trait]
impl JobFetcher for StubFetcher {
    async fn fetch(&self, job: &JobDescriptor) -> CrawlerResult<Option<CompletedJobPayload>> {
        if self.fail_timelines && job.job_type == JobType::Timeline {
            return Err(CrawlerError::transport("source unavailable"));
        }
        let mut payload = CompletedJobPayload::new(job.job_type, job.id.clone());
        payload.record.insert("fetched".to_string(), json!(true));
        Ok(Some(payload))
    }
}

struct TestMaster {
    address: String,
    scheduler: Arc<JobScheduler>,
    store: InMemoryDocumentStore,
    server: tokio::task::JoinHandle<()>,
}

impl TestMaster {
    async fn spawn(seed_ids: &[&str]) -> TestMaster {
        let store = InMemoryDocumentStore::new();
        let scheduler = Arc::new(JobScheduler::new(
            Arc::new(store.clone()),
            Arc::new(MetricsCollector::new()),
            SchedulerSettings::new(Duration::from_secs(300), "crawl"),
        ));
        let ids: Vec<String> = seed_ids.iter().map(|id| id.to_string()).collect();
        scheduler.seed(&ids).await;

        let app = create_app(AppState::new(scheduler.clone(), &MasterConfig::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestMaster {
            address,
            scheduler,
            store,
            server,
        }
    }
}

impl Drop for TestMaster {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        batch_size: 5,
        submit_attempts: 2,
        retry_interval_ms: 10,
        idle_interval_ms: 10,
        ..WorkerConfig::default()
    }
}

fn create_worker(master_address: &str, fetcher: Arc<dyn JobFetcher>) -> CrawlWorker {
    CrawlWorker::new(
        "worker-test",
        MasterClient::new(master_address),
        fetcher,
        &worker_config(),
    )
}

async fn spawn_source() -> String {
    async fn profile(Path(id): Path<String>) -> Json<Value> {
        Json(json!({
            "id": id,
            "username": format!("user-{id}"),
            "mentions": ["7"]
        }))
    }

    async fn timeline(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
        if id == "missing" {
            return Err(StatusCode::NOT_FOUND);
        }
        Ok(Json(json!({ "posts": [{"likes": 3}] })))
    }

    let app = Router::new()
        .route("/profiles/{id}", get(profile))
        .route("/timelines/{id}", get(timeline));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    address
}

#[tokio::test]
async fn test_run_once_completes_leased_batch() {
    let master = TestMaster::spawn(&["42"]).await;
    let worker = create_worker(
        &master.address,
        Arc::new(StubFetcher {
            fail_timelines: false,
        }),
    );

    let outcome = worker.run_once().await.unwrap();

    assert_eq!(outcome.leased, 2);
    assert_eq!(outcome.fetched, 2);
    let receipt = outcome.receipt.unwrap();
    assert_eq!(receipt.persisted, 2);
    assert_eq!(receipt.removed, 2);
    assert!(master.scheduler.is_empty().await);
    assert_eq!(master.store.write_log().await.len(), 2);
}

#[tokio::test]
async fn test_failed_fetches_are_left_to_lease_recovery() {
    let master = TestMaster::spawn(&["42"]).await;
    let worker = create_worker(
        &master.address,
        Arc::new(StubFetcher {
            fail_timelines: true,
        }),
    );

    let outcome = worker.run_once().await.unwrap();

    assert_eq!(outcome.leased, 2);
    assert_eq!(outcome.fetched, 1);
    let snapshot = master.scheduler.snapshot().await;
    assert_eq!(snapshot.total, 1);
    assert_eq!(snapshot.pending, 1);
}

#[tokio::test]
async fn test_run_once_with_empty_queue() {
    let master = TestMaster::spawn(&[]).await;
    let worker = create_worker(
        &master.address,
        Arc::new(StubFetcher {
            fail_timelines: false,
        }),
    );

    let outcome = worker.run_once().await.unwrap();
    assert_eq!(outcome.leased, 0);
    assert!(outcome.receipt.is_none());
}

#[tokio::test]
async fn test_store_failure_is_reported_after_retries() {
    let master = TestMaster::spawn(&["42"]).await;
    master.store.set_fail_all_puts(true).await;
    let worker = create_worker(
        &master.address,
        Arc::new(StubFetcher {
            fail_timelines: false,
        }),
    );

    let err = worker.run_once().await.unwrap_err();

    assert!(matches!(err, CrawlerError::HttpStatus { status: 502, .. }));
    assert_eq!(master.scheduler.snapshot().await.pending, 2);
}

#[tokio::test]
async fn test_unreachable_master() {
    let worker = create_worker(
        "127.0.0.1:1",
        Arc::new(StubFetcher {
            fail_timelines: false,
        }),
    );
    let err = worker.run_once().await.unwrap_err();
    assert!(matches!(err, CrawlerError::Transport(_)));
}

#[tokio::test]
async fn test_http_fetcher_end_to_end() {
    let source = spawn_source().await;
    let master = TestMaster::spawn(&["42", "missing"]).await;
    let worker = create_worker(&master.address, Arc::new(HttpJsonFetcher::new(source)));

    let outcome = worker.run_once().await.unwrap();
    assert_eq!(outcome.leased, 4);
    assert_eq!(outcome.fetched, 3);

    let profile = master.store.get("crawl", "0-42").await.unwrap();
    assert_eq!(profile["username"], json!("user-42"));
    assert_eq!(profile["mentions"], json!(["7"]));

    let uids: Vec<String> = master
        .scheduler
        .jobs()
        .await
        .iter()
        .map(|job| job.uid().to_string())
        .collect();
    assert!(uids.contains(&"1-missing".to_string()));
    assert!(uids.contains(&"0-7".to_string()));
    assert!(uids.contains(&"1-7".to_string()));
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let master = TestMaster::spawn(&[]).await;
    let worker = create_worker(
        &master.address,
        Arc::new(StubFetcher {
            fail_timelines: false,
        }),
    );
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker did not stop")
        .unwrap();
}
