//! 领域仓储抽象
//!
//! 调度器只通过该接口访问外部文档存储，具体实现位于基础设施层。

use async_trait::async_trait;
use crawler_core::CrawlerResult;

/// 外部文档存储（去重/持久化网关）
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 以 `key` 写入文档，重复写入同一键为覆盖
    async fn put(&self, collection: &str, key: &str, value: &serde_json::Value)
        -> CrawlerResult<()>;

    /// 返回匹配 `query` 的文档数量
    async fn search(&self, collection: &str, query: &str) -> CrawlerResult<u64>;
}
