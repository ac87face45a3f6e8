use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crawler_core::{AppConfig, CrawlerError, CrawlerResult};
use crawler_domain::{
    filter_idle, find_job, find_job_mut, sort_jobs, CompletedJobPayload, DocumentStore, Job,
    JobDescriptor, JobState, JobType,
};
use crawler_infrastructure::MetricsCollector;

use crate::lease_timer::{LeaseId, LeaseTimers};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub lease_timeout: Duration,
    /// 文档存储中的集合名
    pub collection: String,
}

impl SchedulerSettings {
    pub fn new(lease_timeout: Duration, collection: impl Into<String>) -> Self {
        Self {
            lease_timeout,
            collection: collection.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.master.lease_timeout(), &config.store.collection)
    }
}

/// 完成一批任务的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    /// 成功持久化的记录数
    pub persisted: usize,
    /// 从队列移除的任务数
    pub removed: usize,
    /// 已超时重置或已不在队列中的任务数
    pub ignored: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionReport {
    pub added: usize,
    pub bumped: usize,
    pub already_stored: usize,
}

/// 队列概况
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub total: usize,
    pub idle: usize,
    pub pending: usize,
    pub failed: usize,
    pub active_leases: usize,
    pub failed_jobs: Vec<Job>,
}

struct QueueState {
    /// 按优先级降序排列
    jobs: Vec<Job>,
    timers: LeaseTimers,
    next_lease_id: LeaseId,
}

/// 任务队列与租约协议
///
/// 队列、计时器表与租约编号由同一把锁保护；存储I/O期间不持有锁。
pub struct JobScheduler {
    state: Arc<Mutex<QueueState>>,
    store: Arc<dyn DocumentStore>,
    metrics: Arc<MetricsCollector>,
    settings: SchedulerSettings,
}

impl JobScheduler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        metrics: Arc<MetricsCollector>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                jobs: Vec::new(),
                timers: LeaseTimers::new(),
                next_lease_id: 0,
            })),
            store,
            metrics,
            settings,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// 启动时的种子任务：每个ID生成一个资料任务和一个时间线任务
    pub async fn seed(&self, ids: &[String]) -> usize {
        let mut state = self.state.lock().await;
        let mut added = 0;

        for id in ids {
            for job_type in [JobType::Profile, JobType::Timeline] {
                let job = Job::new(job_type, id.as_str());
                if find_job(&job, &state.jobs, true).is_none() {
                    state.jobs.push(job);
                    added += 1;
                }
            }
        }

        state.jobs = sort_jobs(std::mem::take(&mut state.jobs));
        self.metrics.update_queue_depth(state.jobs.len());
        info!("已载入 {} 个种子任务", added);
        added
    }

    /// 租约最多 `count` 个空闲任务，按优先级从高到低返回
    #[instrument(skip(self))]
    pub async fn lease(&self, count: usize) -> Vec<JobDescriptor> {
        let mut guard = self.state.lock().await;
        let QueueState {
            jobs,
            timers,
            next_lease_id,
        } = &mut *guard;

        let mut candidates = filter_idle(jobs, false);
        candidates.sort_by(|a, b| crawler_domain::compare_jobs(a, b));
        let selected: Vec<String> = candidates
            .into_iter()
            .take(count)
            .map(|job| job.uid().to_string())
            .collect();

        let mut leased = Vec::with_capacity(selected.len());
        for uid in selected {
            let Some(job) = jobs.iter_mut().find(|job| job.uid() == uid) else {
                continue;
            };
            job.mark_active();
            leased.push(job.descriptor());

            *next_lease_id += 1;
            let handle = self.spawn_lease_timer(uid.clone(), *next_lease_id);
            timers.arm(uid, *next_lease_id, handle);
        }

        if !leased.is_empty() {
            self.metrics.record_lease(leased.len());
            debug!(leased = leased.len(), "Jobs leased");
        }
        leased
    }

    fn spawn_lease_timer(&self, uid: String, lease_id: LeaseId) -> JoinHandle<()> {
        let state: Weak<Mutex<QueueState>> = Arc::downgrade(&self.state);
        let metrics = self.metrics.clone();
        let timeout = self.settings.lease_timeout;

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            let mut guard = state.lock().await;
            expire_lease(&mut guard, &uid, lease_id, &metrics);
        })
    }

    /// 持久化并完成一批任务
    ///
    /// 全部写入成功后才修改队列；任一写入失败时队列不变并返回存储错误。
    #[instrument(skip(self, payloads), fields(batch = payloads.len()))]
    pub async fn complete(
        &self,
        payloads: Vec<CompletedJobPayload>,
    ) -> CrawlerResult<CompletionReport> {
        if payloads.is_empty() {
            return Ok(CompletionReport::default());
        }

        let collection = self.settings.collection.as_str();
        let writes = payloads.iter().map(|payload| {
            let key = payload.uid();
            let document = payload.to_document();
            async move {
                let started = Instant::now();
                let result = self.store.put(collection, &key, &document).await;
                self.metrics.record_store_operation(
                    "put",
                    started.elapsed().as_secs_f64(),
                    result.is_ok(),
                );
                result
            }
        });
        let results = join_all(writes).await;

        let failures: Vec<&CrawlerError> =
            results.iter().filter_map(|result| result.as_ref().err()).collect();
        if let Some(first) = failures.first() {
            warn!(
                failed = failures.len(),
                total = payloads.len(),
                "批次持久化失败，队列保持不变"
            );
            return Err(CrawlerError::store_error(format!(
                "{}/{} 条记录持久化失败: {}",
                failures.len(),
                payloads.len(),
                first
            )));
        }

        let mut report = CompletionReport {
            persisted: payloads.len(),
            ..CompletionReport::default()
        };
        {
            let mut state = self.state.lock().await;
            for payload in &payloads {
                let uid = payload.uid();
                let position = state
                    .jobs
                    .iter()
                    .position(|job| job.uid() == uid && job.is_pending());

                match position {
                    Some(index) => {
                        let mut job = state.jobs.remove(index);
                        job.mark_done();
                        state.timers.disarm(&uid);
                        report.removed += 1;
                    }
                    None => {
                        debug!(uid = %uid, "Completion ignored, job no longer pending");
                        report.ignored += 1;
                    }
                }
            }
            self.metrics.update_queue_depth(state.jobs.len());
        }
        self.metrics.record_completion(report.removed, report.ignored);

        let discovered: Vec<Job> = payloads
            .iter()
            .flat_map(|payload| payload.mentions.iter())
            .flat_map(|id| {
                [
                    Job::new(JobType::Profile, id.as_str()),
                    Job::new(JobType::Timeline, id.as_str()),
                ]
            })
            .collect();
        if !discovered.is_empty() {
            if let Err(e) = self.admit(discovered).await {
                warn!("新发现任务入队失败: {}", e);
            }
        }

        Ok(report)
    }

    /// 查询每个候选任务是否已在文档存储中，结果与输入一一对应
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn existence_check(&self, candidates: &[Job]) -> CrawlerResult<Vec<bool>> {
        let collection = self.settings.collection.as_str();
        let searches = candidates.iter().map(|job| async move {
            let started = Instant::now();
            let result = self.store.search(collection, job.id()).await;
            self.metrics.record_store_operation(
                "search",
                started.elapsed().as_secs_f64(),
                result.is_ok(),
            );
            result
        });

        let counts = join_all(searches)
            .await
            .into_iter()
            .collect::<CrawlerResult<Vec<u64>>>()?;

        Ok(counts.into_iter().map(|count| count > 0).collect())
    }

    /// 接纳候选任务
    ///
    /// 已在队列中的任务提升优先级；其余任务经存储去重后加入队列。
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn admit(&self, candidates: Vec<Job>) -> CrawlerResult<AdmissionReport> {
        let mut report = AdmissionReport::default();
        let mut fresh: Vec<Job> = Vec::new();

        {
            let mut state = self.state.lock().await;
            for candidate in candidates {
                if let Some(job) = find_job_mut(&candidate, &mut state.jobs, true) {
                    job.bump_priority();
                    report.bumped += 1;
                } else if find_job(&candidate, &fresh, true).is_none() {
                    fresh.push(candidate);
                }
            }
            if report.bumped > 0 {
                state.jobs = sort_jobs(std::mem::take(&mut state.jobs));
            }
        }

        if !fresh.is_empty() {
            let stored = self.existence_check(&fresh).await?;

            let mut state = self.state.lock().await;
            for (job, exists) in fresh.into_iter().zip(stored) {
                if exists {
                    report.already_stored += 1;
                } else if find_job(&job, &state.jobs, true).is_none() {
                    state.jobs.push(job);
                    report.added += 1;
                }
            }
            state.jobs = sort_jobs(std::mem::take(&mut state.jobs));
            self.metrics.update_queue_depth(state.jobs.len());
        }

        self.metrics.record_admission(report.added, report.bumped);
        Ok(report)
    }

    /// 在锁内对匹配的任务执行 `f`，返回其结果
    pub async fn update_job<F, R>(&self, target: &Job, match_type: bool, f: F) -> Option<R>
    where
        F: FnOnce(&mut Job) -> R,
    {
        let mut state = self.state.lock().await;
        find_job_mut(target, &mut state.jobs, match_type).map(f)
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock().await;
        let count = |wanted: JobState| state.jobs.iter().filter(|j| j.state() == wanted).count();

        QueueSnapshot {
            total: state.jobs.len(),
            idle: count(JobState::Idle),
            pending: count(JobState::Pending),
            failed: count(JobState::Failed),
            active_leases: state.timers.len(),
            failed_jobs: state
                .jobs
                .iter()
                .filter(|job| job.state() == JobState::Failed)
                .cloned()
                .collect(),
        }
    }

    pub async fn jobs(&self) -> Vec<Job> {
        self.state.lock().await.jobs.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// 租约到期：仅当该租约仍是当前租约且任务仍处于 Pending 时重置任务
fn expire_lease(state: &mut QueueState, uid: &str, lease_id: LeaseId, metrics: &MetricsCollector) {
    if !state.timers.take_if_current(uid, lease_id) {
        return;
    }
    let Some(job) = state.jobs.iter_mut().find(|job| job.uid() == uid) else {
        return;
    };
    if !job.is_pending() {
        return;
    }

    match job.reset_state() {
        JobState::Failed => metrics.record_permanent_failure(uid, job.fail_count()),
        _ => metrics.record_lease_expiration(uid, job.fail_count()),
    }
}
