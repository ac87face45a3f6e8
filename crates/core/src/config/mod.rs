pub mod models;
pub mod validation;

use std::path::Path;

use ::config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

pub use models::*;
pub use validation::{ConfigValidator, ValidationUtils};

use crate::{CrawlerError, CrawlerResult};

/// 默认配置文件路径，不存在时使用内置默认值
pub const DEFAULT_CONFIG_PATH: &str = "config/crawler.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub master: MasterConfig,
    pub directory: DirectoryConfig,
    pub store: StoreConfig,
    pub worker: WorkerConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 加载配置：TOML文件（可选） + `CRAWLER_` 前缀的环境变量
    ///
    /// 显式指定的文件必须存在；默认路径缺失时退回内置默认值。
    /// 环境变量使用 `__` 分隔层级，例如 `CRAWLER_MASTER__LEASE_TIMEOUT_SECONDS=60`。
    pub fn load(config_path: Option<&str>) -> CrawlerResult<Self> {
        let mut builder = ConfigBuilder::builder();

        match config_path {
            Some(path) if Path::new(path).exists() => {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
            Some(path) if path != DEFAULT_CONFIG_PATH => {
                return Err(CrawlerError::config_error(format!("配置文件不存在: {path}")));
            }
            _ => {
                if Path::new(DEFAULT_CONFIG_PATH).exists() {
                    builder = builder.add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("CRAWLER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("master.seed_ids"),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> CrawlerResult<Self> {
        let config: AppConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> CrawlerResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CrawlerError::Serialization(format!("序列化配置为TOML失败: {e}")))
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> CrawlerResult<()> {
        self.master.validate()?;
        self.directory.validate()?;
        self.store.validate()?;
        self.worker.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
