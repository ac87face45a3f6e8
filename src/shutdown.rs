use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crawler_infrastructure::Communicator;

/// 优雅关闭管理器
pub struct ShutdownManager {
    /// 关闭信号发送器
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,
    /// 是否已经关闭
    is_shutdown: Arc<RwLock<bool>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            shutdown_tx: Arc::new(RwLock::new(Some(shutdown_tx))),
            is_shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// 订阅关闭信号
    pub async fn subscribe(&self) -> broadcast::Receiver<()> {
        let shutdown_tx = self.shutdown_tx.read().await;
        if let Some(ref tx) = *shutdown_tx {
            tx.subscribe()
        } else {
            // 已经关闭时返回立即触发的接收器
            let (tx, rx) = broadcast::channel(1);
            let _ = tx.send(());
            rx
        }
    }

    /// 触发关闭
    pub async fn shutdown(&self) {
        let mut is_shutdown = self.is_shutdown.write().await;
        if *is_shutdown {
            debug!("关闭管理器已经触发过关闭");
            return;
        }

        info!("触发系统关闭");
        *is_shutdown = true;

        let shutdown_tx = self.shutdown_tx.read().await;
        if let Some(ref tx) = *shutdown_tx {
            debug!("发送关闭信号给 {} 个订阅者", tx.receiver_count());
            let _ = tx.send(());
        }

        drop(shutdown_tx);
        let mut shutdown_tx = self.shutdown_tx.write().await;
        *shutdown_tx = None;
    }

    pub async fn is_shutdown(&self) -> bool {
        *self.is_shutdown.read().await
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ShutdownManager {
    fn clone(&self) -> Self {
        Self {
            shutdown_tx: Arc::clone(&self.shutdown_tx),
            is_shutdown: Arc::clone(&self.is_shutdown),
        }
    }
}

/// 退出时从目录服务注销本节点地址
///
/// 正常退出、信号、应用错误与panic共用同一个钩子，只有第一次调用会发出请求。
/// 地址注册成功并调用 `arm` 之前，触发不会发出任何请求。
#[derive(Clone)]
pub struct UnregisterHook {
    communicator: Arc<Communicator>,
    registered: Arc<AtomicBool>,
    fired: Arc<AtomicBool>,
}

impl UnregisterHook {
    pub fn new(communicator: Arc<Communicator>) -> Self {
        Self {
            communicator,
            registered: Arc::new(AtomicBool::new(false)),
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 地址注册成功后调用
    pub fn arm(&self) {
        self.registered.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// 返回本次调用是否实际执行了注销
    pub async fn fire(&self) -> bool {
        if !self.is_armed() {
            debug!("地址尚未注册，跳过注销");
            return false;
        }
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!("注销钩子已经执行过");
            return false;
        }

        info!("从目录服务注销地址: {}", self.communicator.server());
        self.communicator.unregister_address().await;
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}
