//! 目录服务通信
//!
//! Master启动后把自己的地址注册到目录服务，退出时尽力注销；
//! Worker通过轮询目录服务获得Master地址。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crawler_core::{CrawlerError, CrawlerResult, DirectoryConfig};

/// 单次轮询得到的响应
#[derive(Debug, Clone)]
pub struct PollResponse {
    pub status: u16,
    pub body: String,
}

impl PollResponse {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// 目录服务 `GET {server}/{endpoint}` 的响应体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub address: Option<String>,
}

impl DirectoryEntry {
    /// 解析响应体；格式错误或地址为空时返回 None
    pub fn parse_address(body: &str) -> Option<String> {
        serde_json::from_str::<DirectoryEntry>(body)
            .ok()
            .and_then(|entry| entry.address)
    }
}

pub struct Communicator {
    server: String,
    endpoint: String,
    poll_interval: Duration,
    unregister_timeout: Duration,
    http_client: reqwest::Client,
}

impl Communicator {
    pub fn new(server: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let defaults = DirectoryConfig::default();
        Self {
            server: server.into().trim_end_matches('/').to_string(),
            endpoint: endpoint.into().trim_matches('/').to_string(),
            poll_interval: defaults.poll_interval(),
            unregister_timeout: defaults.unregister_timeout(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &DirectoryConfig) -> CrawlerResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CrawlerError::Internal(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            http_client,
            poll_interval: config.poll_interval(),
            unregister_timeout: config.unregister_timeout(),
            ..Self::new(&config.server, &config.endpoint)
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_unregister_timeout(mut self, timeout: Duration) -> Self {
        self.unregister_timeout = timeout;
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn directory_url(&self) -> String {
        format!("{}/{}", self.server, self.endpoint)
    }

    /// 周期性请求 `address/endpoint`，直到 `accept` 接受某个响应
    ///
    /// 第一次请求发生在一个 `interval` 之后。`reject_on_error` 为 true 时，
    /// 第一次网络错误或状态码 >= 400 即返回错误；否则网络错误被跳过，
    /// 错误状态码的响应同样交给 `accept` 判断。
    ///
    /// 该操作没有超时，需要限时等待时由调用方包一层 `tokio::time::timeout`。
    pub async fn poll<F>(
        &self,
        address: &str,
        endpoint: &str,
        interval: Duration,
        mut accept: F,
        reject_on_error: bool,
    ) -> CrawlerResult<String>
    where
        F: FnMut(&PollResponse) -> bool,
    {
        let url = format!(
            "{}/{}",
            address.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        let mut attempts: u64 = 0;

        loop {
            tokio::time::sleep(interval).await;
            attempts += 1;

            let response = match self.http_client.get(&url).send().await {
                Ok(response) => response,
                Err(e) if reject_on_error => {
                    return Err(CrawlerError::transport(format!("轮询 {url} 失败: {e}")));
                }
                Err(e) => {
                    debug!(attempt = attempts, "Poll request to {} failed: {}", url, e);
                    continue;
                }
            };

            let status = response.status().as_u16();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) if reject_on_error => {
                    return Err(CrawlerError::transport(format!("读取 {url} 响应失败: {e}")));
                }
                Err(e) => {
                    debug!(attempt = attempts, "Failed to read poll response: {}", e);
                    continue;
                }
            };

            let polled = PollResponse { status, body };
            if polled.is_error() && reject_on_error {
                return Err(CrawlerError::http_status(polled.status, polled.body));
            }

            if accept(&polled) {
                debug!(attempts = attempts, "Poll of {} accepted", url);
                return Ok(polled.body);
            }
        }
    }

    /// 将本节点地址注册到目录服务
    #[instrument(skip(self))]
    pub async fn register_address(&self, address: &str) -> CrawlerResult<()> {
        let url = format!("{}/{}", self.directory_url(), address);

        let response = self
            .http_client
            .put(&url)
            .json(&json!({ "address": address }))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to connect to directory for registration: {}", e);
                CrawlerError::transport(format!("注册地址失败: {e}"))
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            error!("Failed to register address: HTTP {} - {}", status, body);
            return Err(CrawlerError::http_status(status.as_u16(), body));
        }

        info!("已向目录服务注册地址 {}", address);
        Ok(())
    }

    /// 尽力注销本节点地址，失败只记录日志
    pub async fn unregister_address(&self) {
        let url = self.directory_url();
        let request = self.http_client.delete(&url).send();

        match tokio::time::timeout(self.unregister_timeout, request).await {
            Ok(Ok(response)) if response.status().is_success() => {
                info!("已从目录服务注销地址");
            }
            Ok(Ok(response)) => {
                warn!("Failed to unregister address: HTTP {}", response.status());
            }
            Ok(Err(e)) => {
                warn!("Failed to unregister address: {}", e);
            }
            Err(_) => {
                warn!(
                    "Unregister request timed out after {:?}",
                    self.unregister_timeout
                );
            }
        }
    }

    /// 轮询目录服务直到获得Master地址
    pub async fn get_address(&self) -> CrawlerResult<String> {
        info!("等待目录服务提供Master地址: {}", self.directory_url());

        let body = self
            .poll(
                &self.server,
                &self.endpoint,
                self.poll_interval,
                |response| DirectoryEntry::parse_address(&response.body).is_some(),
                false,
            )
            .await?;

        let address = DirectoryEntry::parse_address(&body).ok_or_else(|| {
            CrawlerError::Internal(format!("目录服务响应缺少地址: {body}"))
        })?;

        info!("获得Master地址 {}", address);
        Ok(address)
    }
}
