use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crawler_core::{CrawlerError, CrawlerResult, StoreConfig};
use crawler_domain::DocumentStore;

/// 基于HTTP的文档存储客户端
///
/// 协议：
/// - `PUT {base}/v0/{collection}/{key}` 写入或覆盖文档
/// - `GET {base}/v0/{collection}?query={q}` 返回 `{"total_count": n}`
pub struct HttpDocumentStore {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    total_count: Option<u64>,
    count: Option<u64>,
}

impl HttpDocumentStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(base_url, api_key, reqwest::Client::new())
    }

    pub fn with_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http_client,
        }
    }

    pub fn from_config(config: &StoreConfig, api_key: String) -> CrawlerResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CrawlerError::Internal(format!("创建HTTP客户端失败: {e}")))?;
        Ok(Self::with_client(&config.base_url, api_key, http_client))
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/v0/{}", self.base_url, collection)
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    #[instrument(skip(self, value), fields(collection = collection, key = key))]
    async fn put(
        &self,
        collection: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> CrawlerResult<()> {
        let url = format!("{}/{}", self.collection_url(collection), key);
        let started = Instant::now();

        let response = self
            .http_client
            .put(&url)
            .bearer_auth(&self.api_key)
            .json(value)
            .send()
            .await
            .map_err(|e| CrawlerError::store_error(format!("写入文档 {key} 失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Document write rejected: HTTP {} - {}", status, body);
            return Err(CrawlerError::store_error(format!(
                "写入文档 {key} 失败: HTTP {status} - {body}"
            )));
        }

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Document stored"
        );
        Ok(())
    }

    #[instrument(skip(self), fields(collection = collection))]
    async fn search(&self, collection: &str, query: &str) -> CrawlerResult<u64> {
        let response = self
            .http_client
            .get(self.collection_url(collection))
            .bearer_auth(&self.api_key)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|e| CrawlerError::store_error(format!("查询 {query} 失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrawlerError::store_error(format!(
                "查询 {query} 失败: HTTP {status} - {body}"
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| CrawlerError::store_error(format!("解析查询结果失败: {e}")))?;

        parsed.total_count.or(parsed.count).ok_or_else(|| {
            CrawlerError::store_error(format!("查询 {query} 的响应缺少 total_count 字段"))
        })
    }
}
