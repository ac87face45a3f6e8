use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crawler_core::{CrawlerResult, WorkerConfig};

use crate::fetcher::JobFetcher;
use crate::master_client::{CompletionReceipt, MasterClient};

/// 一轮租约-抓取-提交的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub leased: usize,
    pub fetched: usize,
    pub receipt: Option<CompletionReceipt>,
}

/// 爬取Worker
pub struct CrawlWorker {
    worker_id: String,
    master: MasterClient,
    fetcher: Arc<dyn JobFetcher>,
    batch_size: usize,
    submit_attempts: usize,
    retry_interval: Duration,
    idle_interval: Duration,
}

impl CrawlWorker {
    pub fn new(
        worker_id: impl Into<String>,
        master: MasterClient,
        fetcher: Arc<dyn JobFetcher>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            master,
            fetcher,
            batch_size: config.batch_size,
            submit_attempts: config.submit_attempts.max(1),
            retry_interval: config.retry_interval(),
            idle_interval: config.idle_interval(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// 执行一轮：租约一批任务，并发抓取，提交成功抓取的结果
    ///
    /// 抓取失败的任务不提交，由Master在租约超时后重新调度。
    pub async fn run_once(&self) -> CrawlerResult<BatchOutcome> {
        let jobs = self.master.lease_jobs(self.batch_size).await?;
        if jobs.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let results = join_all(jobs.iter().map(|job| self.fetcher.fetch(job))).await;

        let mut payloads = Vec::with_capacity(jobs.len());
        for (job, result) in jobs.iter().zip(results) {
            match result {
                Ok(Some(payload)) => payloads.push(payload),
                Ok(None) => debug!(uid = %job.uid(), "No data for job"),
                Err(e) => warn!("抓取任务 {} 失败: {}", job.uid(), e),
            }
        }

        let mut outcome = BatchOutcome {
            leased: jobs.len(),
            fetched: payloads.len(),
            receipt: None,
        };
        if payloads.is_empty() {
            return Ok(outcome);
        }

        let receipt = self.submit_with_retry(&payloads).await?;
        info!(
            worker_id = %self.worker_id,
            persisted = receipt.persisted,
            removed = receipt.removed,
            ignored = receipt.ignored,
            "批次提交完成"
        );
        outcome.receipt = Some(receipt);
        Ok(outcome)
    }

    async fn submit_with_retry(
        &self,
        payloads: &[crawler_domain::CompletedJobPayload],
    ) -> CrawlerResult<CompletionReceipt> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.master.complete_jobs(payloads).await {
                Ok(receipt) => return Ok(receipt),
                Err(e) if attempt < self.submit_attempts && e.is_retryable() => {
                    warn!(
                        "提交结果失败 (第{}/{}次)，稍后重试: {}",
                        attempt, self.submit_attempts, e
                    );
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 循环执行直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Worker {} 开始工作", self.worker_id);

        loop {
            let outcome = tokio::select! {
                _ = shutdown_rx.recv() => break,
                outcome = self.run_once() => outcome,
            };

            let wait = match outcome {
                Ok(outcome) if outcome.leased > 0 => Duration::ZERO,
                Ok(_) => self.idle_interval,
                Err(e) => {
                    error!("Worker {} 本轮执行失败: {}", self.worker_id, e);
                    self.idle_interval
                }
            };

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("Worker {} 已停止", self.worker_id);
    }
}
