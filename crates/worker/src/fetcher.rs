use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crawler_core::{CrawlerError, CrawlerResult};
use crawler_domain::{CompletedJobPayload, JobDescriptor, JobType};

/// 外部数据源抽象
///
/// 返回 `Ok(None)` 表示该任务没有可提交的数据。
#[async_trait]
pub trait JobFetcher: Send + Sync {
    async fn fetch(&self, job: &JobDescriptor) -> CrawlerResult<Option<CompletedJobPayload>>;
}

/// 从JSON HTTP数据源抓取记录
///
/// 资料任务请求 `{source}/profiles/{id}`，时间线任务请求 `{source}/timelines/{id}`。
/// 响应必须是JSON对象，其中字符串数组字段 `mentions` 会被提取为新发现的ID。
pub struct HttpJsonFetcher {
    source_url: String,
    http_client: reqwest::Client,
}

impl HttpJsonFetcher {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(source_url: impl Into<String>, timeout: Duration) -> CrawlerResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CrawlerError::Internal(format!("创建HTTP客户端失败: {e}")))?;
        Ok(Self {
            http_client,
            ..Self::new(source_url)
        })
    }

    fn resource_url(&self, job: &JobDescriptor) -> Option<String> {
        let collection = match job.job_type {
            JobType::Profile => "profiles",
            JobType::Timeline => "timelines",
            JobType::Unknown => return None,
        };
        Some(format!("{}/{}/{}", self.source_url, collection, job.id))
    }
}

/// 将数据源返回的JSON对象转换为完成结果
pub fn payload_from_record(
    job: &JobDescriptor,
    record: serde_json::Value,
) -> CrawlerResult<CompletedJobPayload> {
    let serde_json::Value::Object(mut record) = record else {
        return Err(CrawlerError::validation_error(format!(
            "数据源返回的 {} 不是JSON对象",
            job.uid()
        )));
    };

    let mentions = match record.remove("mentions") {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    record.remove("type");
    record.remove("id");

    Ok(CompletedJobPayload {
        job_type: job.job_type,
        id: job.id.clone(),
        mentions,
        record,
    })
}

#[async_trait]
impl JobFetcher for HttpJsonFetcher {
    async fn fetch(&self, job: &JobDescriptor) -> CrawlerResult<Option<CompletedJobPayload>> {
        let Some(url) = self.resource_url(job) else {
            debug!(id = %job.id, "Skipping job of unknown type");
            return Ok(None);
        };

        info!("抓取任务数据: uid={}, url={}", job.uid(), url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| CrawlerError::transport(format!("请求数据源失败: {e}")))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(CrawlerError::http_status(status.as_u16(), body));
        }

        let record: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CrawlerError::Serialization(format!("解析数据源响应失败: {e}")))?;

        payload_from_record(job, record).map(Some)
    }
}
