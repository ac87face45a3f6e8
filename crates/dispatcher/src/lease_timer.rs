use std::collections::HashMap;

use tokio::task::JoinHandle;
use tracing::debug;

/// 单次租约的编号，用于区分同一任务的先后租约
pub type LeaseId = u64;

struct LeaseEntry {
    lease_id: LeaseId,
    handle: JoinHandle<()>,
}

/// 按任务uid索引的租约计时器表
///
/// 每个uid最多只有一个活动计时器；表被丢弃时所有未触发的计时器一并取消。
#[derive(Default)]
pub struct LeaseTimers {
    entries: HashMap<String, LeaseEntry>,
}

impl LeaseTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新的计时器，同一uid的旧计时器会被取消
    pub fn arm(&mut self, uid: impl Into<String>, lease_id: LeaseId, handle: JoinHandle<()>) {
        let uid = uid.into();
        if let Some(previous) = self.entries.insert(uid.clone(), LeaseEntry { lease_id, handle }) {
            debug!(uid = %uid, lease_id = previous.lease_id, "Replacing lease timer");
            previous.handle.abort();
        }
    }

    /// 取消并移除计时器，返回是否存在
    pub fn disarm(&mut self, uid: &str) -> bool {
        match self.entries.remove(uid) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// 计时器触发时调用：仅当 `lease_id` 仍是该uid的当前租约时移除条目并返回 true
    pub fn take_if_current(&mut self, uid: &str, lease_id: LeaseId) -> bool {
        match self.entries.get(uid) {
            Some(entry) if entry.lease_id == lease_id => {
                self.entries.remove(uid);
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self, uid: &str) -> bool {
        self.entries.contains_key(uid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for LeaseTimers {
    fn drop(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.handle.abort();
        }
    }
}
