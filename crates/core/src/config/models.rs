use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::validation::{ConfigValidator, ValidationUtils};
use crate::{CrawlerError, CrawlerResult};

/// Master节点配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    pub bind_address: String,
    /// 注册到目录服务的地址，未设置时使用 bind_address
    pub advertise_address: Option<String>,
    pub lease_timeout_seconds: u64,
    pub default_lease_count: usize,
    pub max_lease_count: usize,
    pub seed_ids: Vec<String>,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9999".to_string(),
            advertise_address: None,
            lease_timeout_seconds: 300, // 5分钟租约
            default_lease_count: 1,
            max_lease_count: 100,
            seed_ids: Vec::new(),
        }
    }
}

impl MasterConfig {
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_seconds)
    }

    pub fn advertised_address(&self) -> &str {
        self.advertise_address
            .as_deref()
            .unwrap_or(self.bind_address.as_str())
    }
}

impl ConfigValidator for MasterConfig {
    fn validate(&self) -> CrawlerResult<()> {
        ValidationUtils::validate_not_empty(&self.bind_address, "master.bind_address")?;
        if let Some(address) = &self.advertise_address {
            ValidationUtils::validate_not_empty(address, "master.advertise_address")?;
        }
        ValidationUtils::validate_timeout_seconds(
            self.lease_timeout_seconds,
            "master.lease_timeout_seconds",
        )?;
        ValidationUtils::validate_count(self.default_lease_count, "master.default_lease_count")?;
        ValidationUtils::validate_count(self.max_lease_count, "master.max_lease_count")?;
        if self.default_lease_count > self.max_lease_count {
            return Err(CrawlerError::config_error(
                "master.default_lease_count cannot exceed master.max_lease_count",
            ));
        }
        for id in &self.seed_ids {
            ValidationUtils::validate_not_empty(id, "master.seed_ids")?;
        }
        Ok(())
    }
}

/// 目录服务（路由）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub server: String,
    pub endpoint: String,
    pub poll_interval_ms: u64,
    pub request_timeout_seconds: u64,
    pub unregister_timeout_ms: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            server: "http://localhost:9998".to_string(),
            endpoint: "router".to_string(),
            poll_interval_ms: 1000,
            request_timeout_seconds: 10,
            unregister_timeout_ms: 2000,
        }
    }
}

impl DirectoryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn unregister_timeout(&self) -> Duration {
        Duration::from_millis(self.unregister_timeout_ms)
    }
}

impl ConfigValidator for DirectoryConfig {
    fn validate(&self) -> CrawlerResult<()> {
        ValidationUtils::validate_url(&self.server, "directory.server")?;
        ValidationUtils::validate_not_empty(&self.endpoint, "directory.endpoint")?;
        ValidationUtils::validate_interval_ms(self.poll_interval_ms, "directory.poll_interval_ms")?;
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "directory.request_timeout_seconds",
        )?;
        ValidationUtils::validate_interval_ms(
            self.unregister_timeout_ms,
            "directory.unregister_timeout_ms",
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Http,
    Memory,
}

/// 文档存储（去重/持久化网关）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub base_url: String,
    pub collection: String,
    /// 保存访问凭证的环境变量名
    pub api_key_env: String,
    pub request_timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Http,
            base_url: "https://api.orchestrate.io".to_string(),
            collection: "crawl".to_string(),
            api_key_env: "DOCUMENT_STORE_KEY".to_string(),
            request_timeout_seconds: 15,
        }
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// 从进程环境读取存储访问凭证，缺失时返回配置错误
    pub fn api_key(&self) -> CrawlerResult<String> {
        self.api_key_from(|name| std::env::var(name).ok())
    }

    pub fn api_key_from<F>(&self, lookup: F) -> CrawlerResult<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(&self.api_key_env) {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(CrawlerError::config_error(format!(
                "缺少环境变量 {}",
                self.api_key_env
            ))),
        }
    }
}

impl ConfigValidator for StoreConfig {
    fn validate(&self) -> CrawlerResult<()> {
        if self.backend == StoreBackend::Http {
            ValidationUtils::validate_url(&self.base_url, "store.base_url")?;
        }
        ValidationUtils::validate_not_empty(&self.collection, "store.collection")?;
        ValidationUtils::validate_not_empty(&self.api_key_env, "store.api_key_env")?;
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "store.request_timeout_seconds",
        )?;
        Ok(())
    }
}

/// 爬取Worker配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub worker_id: Option<String>,
    pub batch_size: usize,
    pub idle_interval_ms: u64,
    pub submit_attempts: usize,
    pub retry_interval_ms: u64,
    pub source_url: String,
    /// 设置后跳过目录服务发现，直接连接该Master地址
    pub master_address: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: None,
            batch_size: 5,
            idle_interval_ms: 5000,
            submit_attempts: 3,
            retry_interval_ms: 2000,
            source_url: "http://localhost:8000".to_string(),
            master_address: None,
            request_timeout_seconds: 30,
        }
    }
}

impl WorkerConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl ConfigValidator for WorkerConfig {
    fn validate(&self) -> CrawlerResult<()> {
        if let Some(id) = &self.worker_id {
            ValidationUtils::validate_not_empty(id, "worker.worker_id")?;
        }
        ValidationUtils::validate_count(self.batch_size, "worker.batch_size")?;
        ValidationUtils::validate_interval_ms(self.idle_interval_ms, "worker.idle_interval_ms")?;
        ValidationUtils::validate_count(self.submit_attempts, "worker.submit_attempts")?;
        ValidationUtils::validate_interval_ms(self.retry_interval_ms, "worker.retry_interval_ms")?;
        ValidationUtils::validate_url(&self.source_url, "worker.source_url")?;
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "worker.request_timeout_seconds",
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ConfigValidator for ObservabilityConfig {
    fn validate(&self) -> CrawlerResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(CrawlerError::config_error(format!(
                "Invalid log level: {}. Valid options: {:?}",
                self.log_level, valid_levels
            )));
        }
        Ok(())
    }
}
