use std::sync::Arc;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;

use crawler_core::MasterConfig;
use crawler_dispatcher::JobScheduler;

use crate::handlers::{
    health::health_check,
    jobs::{complete_jobs, lease_jobs},
    system::{metrics, queue_status},
};

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<JobScheduler>,
    pub default_lease_count: usize,
    pub max_lease_count: usize,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(scheduler: Arc<JobScheduler>, config: &MasterConfig) -> Self {
        Self {
            scheduler,
            default_lease_count: config.default_lease_count,
            max_lease_count: config.max_lease_count,
            metrics_handle: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 租约协议
        .route("/master/job", get(lease_jobs).put(complete_jobs))
        // 队列状态与指标
        .route("/master/status", get(queue_status))
        .route("/metrics", get(metrics))
        .with_state(state)
}
