use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crawler_core::{CrawlerError, CrawlerResult};
use crawler_domain::DocumentStore;

#[derive(Debug, Default)]
struct StoreState {
    /// collection -> key -> document
    collections: HashMap<String, HashMap<String, serde_json::Value>>,
    /// 按调用顺序记录的成功写入 `collection/key`
    write_log: Vec<String>,
    search_count: usize,
    failing_keys: HashSet<String>,
    fail_all_puts: bool,
    fail_searches: bool,
}

/// 内存文档存储
///
/// 用于 `store.backend = "memory"` 的单机运行以及测试，支持注入写入/查询失败。
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入文档，不计入写入日志
    pub async fn insert(&self, collection: &str, key: &str, value: serde_json::Value) {
        let mut state = self.state.write().await;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub async fn get(&self, collection: &str, key: &str) -> Option<serde_json::Value> {
        let state = self.state.read().await;
        state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned()
    }

    pub async fn write_log(&self) -> Vec<String> {
        self.state.read().await.write_log.clone()
    }

    pub async fn search_count(&self) -> usize {
        self.state.read().await.search_count
    }

    pub async fn set_fail_all_puts(&self, fail: bool) {
        self.state.write().await.fail_all_puts = fail;
    }

    pub async fn fail_put_for(&self, key: &str) {
        self.state.write().await.failing_keys.insert(key.to_string());
    }

    pub async fn set_fail_searches(&self, fail: bool) {
        self.state.write().await.fail_searches = fail;
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put(
        &self,
        collection: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> CrawlerResult<()> {
        let mut state = self.state.write().await;
        if state.fail_all_puts || state.failing_keys.contains(key) {
            return Err(CrawlerError::store_error(format!("写入文档 {key} 失败")));
        }

        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value.clone());
        state.write_log.push(format!("{collection}/{key}"));
        debug!(collection = collection, key = key, "Document stored in memory");
        Ok(())
    }

    async fn search(&self, collection: &str, query: &str) -> CrawlerResult<u64> {
        let mut state = self.state.write().await;
        state.search_count += 1;
        if state.fail_searches {
            return Err(CrawlerError::store_error(format!("查询 {query} 失败")));
        }

        let matches = state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(key, doc)| {
                        key.as_str() == query
                            || doc.get("id").and_then(|id| id.as_str()) == Some(query)
                    })
                    .count()
            })
            .unwrap_or(0);

        Ok(matches as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_overwrites_and_logs() {
        let store = InMemoryDocumentStore::new();
        store.put("crawl", "0-1", &json!({"id": "1", "v": 1})).await.unwrap();
        store.put("crawl", "0-1", &json!({"id": "1", "v": 2})).await.unwrap();

        assert_eq!(store.get("crawl", "0-1").await, Some(json!({"id": "1", "v": 2})));
        assert_eq!(store.write_log().await, vec!["crawl/0-1", "crawl/0-1"]);
    }

    #[tokio::test]
    async fn test_search_matches_document_id() {
        let store = InMemoryDocumentStore::new();
        store.insert("crawl", "0-42", json!({"id": "42"})).await;
        store.insert("crawl", "1-42", json!({"id": "42"})).await;
        store.insert("other", "0-42", json!({"id": "42"})).await;

        assert_eq!(store.search("crawl", "42").await.unwrap(), 2);
        assert_eq!(store.search("crawl", "43").await.unwrap(), 0);
        assert_eq!(store.search("missing", "42").await.unwrap(), 0);
        assert_eq!(store.search_count().await, 3);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = InMemoryDocumentStore::new();
        store.fail_put_for("0-2").await;

        assert!(store.put("crawl", "0-1", &json!({})).await.is_ok());
        let err = store.put("crawl", "0-2", &json!({})).await.unwrap_err();
        assert!(matches!(err, CrawlerError::Store(_)));

        store.set_fail_all_puts(true).await;
        assert!(store.put("crawl", "0-1", &json!({})).await.is_err());

        store.set_fail_searches(true).await;
        assert!(store.search("crawl", "1").await.is_err());
        assert_eq!(store.write_log().await.len(), 1);
    }
}
