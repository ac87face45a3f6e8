pub mod config;
pub mod errors;

pub use self::config::{
    AppConfig, ConfigValidator, DirectoryConfig, MasterConfig, ObservabilityConfig, StoreBackend,
    StoreConfig, WorkerConfig,
};
pub use errors::{CrawlerError, CrawlerResult};
