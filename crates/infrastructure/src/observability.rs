use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{debug, error, info, warn};

use crawler_core::{CrawlerError, CrawlerResult};

/// Metrics collector for the crawl coordinator
pub struct MetricsCollector {
    // Lease protocol metrics
    jobs_leased_total: Counter,
    jobs_completed_total: Counter,
    lease_expirations_total: Counter,
    permanent_failures_total: Counter,
    jobs_admitted_total: Counter,

    // Queue metrics
    queue_depth: Gauge,

    // Store metrics
    store_operation_duration: Histogram,
    store_failures_total: Counter,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            jobs_leased_total: counter!("crawler_jobs_leased_total"),
            jobs_completed_total: counter!("crawler_jobs_completed_total"),
            lease_expirations_total: counter!("crawler_lease_expirations_total"),
            permanent_failures_total: counter!("crawler_permanent_failures_total"),
            jobs_admitted_total: counter!("crawler_jobs_admitted_total"),
            queue_depth: gauge!("crawler_queue_depth"),
            store_operation_duration: histogram!("crawler_store_operation_duration_seconds"),
            store_failures_total: counter!("crawler_store_failures_total"),
        }
    }

    /// Record a batch of leased jobs
    pub fn record_lease(&self, count: usize) {
        self.jobs_leased_total.increment(count as u64);
        debug!(count = count, "Jobs leased");
    }

    pub fn record_completion(&self, removed: usize, ignored: usize) {
        self.jobs_completed_total.increment(removed as u64);
        debug!(removed = removed, ignored = ignored, "Jobs completed");
    }

    /// Record a lease timeout that returned the job to the idle pool
    pub fn record_lease_expiration(&self, uid: &str, fail_count: u32) {
        self.lease_expirations_total.increment(1);
        warn!(uid = uid, fail_count = fail_count, "租约超时，任务重新入队");
    }

    /// Record a job that exhausted its lease attempts
    pub fn record_permanent_failure(&self, uid: &str, fail_count: u32) {
        self.permanent_failures_total.increment(1);
        error!(uid = uid, fail_count = fail_count, "任务多次租约超时，标记为失败");
    }

    pub fn record_admission(&self, added: usize, bumped: usize) {
        self.jobs_admitted_total.increment(added as u64);
        if added > 0 || bumped > 0 {
            info!(added = added, bumped = bumped, "新任务入队");
        }
    }

    pub fn update_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as f64);
    }

    // Store metrics

    pub fn record_store_operation(&self, operation: &str, duration_seconds: f64, success: bool) {
        self.store_operation_duration.record(duration_seconds);
        if !success {
            self.store_failures_total.increment(1);
        }

        debug!(
            operation = operation,
            duration_seconds = duration_seconds,
            success = success,
            "Store operation finished"
        );
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// 安装全局 Prometheus recorder，返回用于渲染 `/metrics` 的句柄
pub fn install_prometheus_recorder() -> CrawlerResult<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| CrawlerError::Internal(format!("安装Prometheus recorder失败: {e}")))?;
    info!("Prometheus metrics recorder installed");
    Ok(handle)
}
