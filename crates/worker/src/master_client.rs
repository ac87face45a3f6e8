use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, instrument};

use crawler_core::{CrawlerError, CrawlerResult};
use crawler_domain::{CompletedJobPayload, JobDescriptor};

/// Master对一批完成任务的回执
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct CompletionReceipt {
    pub persisted: usize,
    pub removed: usize,
    pub ignored: usize,
}

#[derive(Debug, Deserialize)]
struct ReceiptEnvelope {
    data: Option<CompletionReceipt>,
}

/// Master租约协议客户端
pub struct MasterClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl MasterClient {
    /// `address` 可以是 `host:port` 或完整URL
    pub fn new(address: &str) -> Self {
        Self::with_client(address, reqwest::Client::new())
    }

    pub fn with_timeout(address: &str, timeout: Duration) -> CrawlerResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CrawlerError::Internal(format!("创建HTTP客户端失败: {e}")))?;
        Ok(Self::with_client(address, http_client))
    }

    fn with_client(address: &str, http_client: reqwest::Client) -> Self {
        let address = address.trim_end_matches('/');
        let base_url = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        Self {
            base_url,
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn job_url(&self) -> String {
        format!("{}/master/job", self.base_url)
    }

    #[instrument(skip(self))]
    pub async fn lease_jobs(&self, count: usize) -> CrawlerResult<Vec<JobDescriptor>> {
        let response = self
            .http_client
            .get(self.job_url())
            .query(&[("count", count)])
            .send()
            .await
            .map_err(|e| CrawlerError::transport(format!("租约请求失败: {e}")))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            error!("Lease request failed: HTTP {} - {}", status, body);
            return Err(CrawlerError::http_status(status.as_u16(), body));
        }

        let jobs: Vec<JobDescriptor> = response
            .json()
            .await
            .map_err(|e| CrawlerError::Serialization(format!("解析租约响应失败: {e}")))?;
        debug!(leased = jobs.len(), "Jobs leased from master");
        Ok(jobs)
    }

    #[instrument(skip(self, payloads), fields(batch = payloads.len()))]
    pub async fn complete_jobs(
        &self,
        payloads: &[CompletedJobPayload],
    ) -> CrawlerResult<CompletionReceipt> {
        let response = self
            .http_client
            .put(self.job_url())
            .json(&json!({ "data": payloads }))
            .send()
            .await
            .map_err(|e| CrawlerError::transport(format!("提交结果失败: {e}")))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            error!("Completion rejected: HTTP {} - {}", status, body);
            return Err(CrawlerError::http_status(status.as_u16(), body));
        }

        let envelope: ReceiptEnvelope = response
            .json()
            .await
            .map_err(|e| CrawlerError::Serialization(format!("解析提交回执失败: {e}")))?;
        Ok(envelope.data.unwrap_or_default())
    }
}
