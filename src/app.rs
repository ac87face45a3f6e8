use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crawler_api::{create_app, AppState};
use crawler_core::{AppConfig, StoreBackend};
use crawler_dispatcher::{JobScheduler, SchedulerSettings};
use crawler_domain::DocumentStore;
use crawler_infrastructure::{
    install_prometheus_recorder, Communicator, HttpDocumentStore, InMemoryDocumentStore,
    MetricsCollector,
};
use crawler_worker::{CrawlWorker, HttpJsonFetcher, MasterClient};

use crate::shutdown::UnregisterHook;

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 任务队列 + HTTP租约接口，并向目录服务注册
    Master,
    /// 从Master租约任务并回传结果
    Worker,
}

impl std::str::FromStr for AppMode {
    type Err = anyhow::Error;

    fn from_str(mode: &str) -> Result<Self> {
        match mode {
            "master" => Ok(AppMode::Master),
            "worker" => Ok(AppMode::Worker),
            _ => Err(anyhow::anyhow!("不支持的运行模式: {mode}")),
        }
    }
}

/// Master模式的已装配组件
struct MasterComponents {
    scheduler: Arc<JobScheduler>,
    state: AppState,
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    master_override: Option<String>,
    communicator: Arc<Communicator>,
    master: Option<MasterComponents>,
    unregister_hook: Option<UnregisterHook>,
}

impl Application {
    /// 装配应用组件
    ///
    /// Master模式在这里读取存储访问凭证，缺失时直接返回错误，不会启动任何服务。
    pub fn new(config: AppConfig, mode: AppMode, master_override: Option<String>) -> Result<Self> {
        let communicator =
            Arc::new(Communicator::from_config(&config.directory).context("创建目录服务客户端失败")?);

        let master = match mode {
            AppMode::Master => Some(Self::build_master(&config)?),
            AppMode::Worker => None,
        };
        let unregister_hook = match mode {
            AppMode::Master => Some(UnregisterHook::new(communicator.clone())),
            AppMode::Worker => None,
        };

        Ok(Self {
            config,
            mode,
            master_override,
            communicator,
            master,
            unregister_hook,
        })
    }

    fn build_master(config: &AppConfig) -> Result<MasterComponents> {
        let store: Arc<dyn DocumentStore> = match config.store.backend {
            StoreBackend::Http => {
                let api_key = config.store.api_key().context("存储访问凭证不可用")?;
                Arc::new(
                    HttpDocumentStore::from_config(&config.store, api_key)
                        .context("创建文档存储客户端失败")?,
                )
            }
            StoreBackend::Memory => {
                warn!("使用内存文档存储，数据不会持久化");
                Arc::new(InMemoryDocumentStore::new())
            }
        };

        // recorder必须先于指标句柄创建安装
        let metrics_handle = if config.observability.metrics_enabled {
            Some(install_prometheus_recorder().context("安装Prometheus recorder失败")?)
        } else {
            None
        };
        let metrics = Arc::new(MetricsCollector::new());

        let scheduler = Arc::new(JobScheduler::new(
            store,
            metrics,
            SchedulerSettings::from_config(config),
        ));

        let mut state = AppState::new(scheduler.clone(), &config.master);
        if let Some(handle) = metrics_handle {
            state = state.with_metrics(handle);
        }

        Ok(MasterComponents { scheduler, state })
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    /// Master模式下返回退出时使用的注销钩子，地址注册成功后才会就绪
    pub fn unregister_hook(&self) -> Option<UnregisterHook> {
        self.unregister_hook.clone()
    }

    /// 运行应用直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        match self.mode {
            AppMode::Master => self.run_master(shutdown_rx).await,
            AppMode::Worker => self.run_worker(shutdown_rx).await,
        }
    }

    async fn run_master(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let components = self
            .master
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Master组件未初始化"))?;
        let master_config = &self.config.master;

        let seeded = components.scheduler.seed(&master_config.seed_ids).await;
        info!("初始任务已加入队列: {} 个", seeded);

        let listener = TcpListener::bind(&master_config.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", master_config.bind_address))?;
        info!("Master API 监听地址: {}", master_config.bind_address);

        let app = create_app(components.state.clone());
        let mut server_shutdown = shutdown_rx.resubscribe();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.recv().await;
                })
                .await
        });

        let address = master_config.advertised_address();
        if let Err(e) = self.communicator.register_address(address).await {
            error!("向目录服务注册地址失败: {}", e);
            server.abort();
            return Err(anyhow::Error::new(e).context(format!("注册Master地址失败: {address}")));
        }
        if let Some(hook) = &self.unregister_hook {
            hook.arm();
        }

        tokio::select! {
            result = &mut server => {
                result.context("Master API 服务任务异常终止")?
                    .context("Master API 服务运行失败")?;
            }
            _ = shutdown_rx.recv() => {
                info!("Master 收到关闭信号");
                server
                    .await
                    .context("Master API 服务任务异常终止")?
                    .context("Master API 服务运行失败")?;
            }
        }

        info!("Master 已停止");
        Ok(())
    }

    async fn run_worker(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let worker_config = &self.config.worker;

        let master_address = match self
            .master_override
            .clone()
            .or_else(|| worker_config.master_address.clone())
        {
            Some(address) => address,
            None => tokio::select! {
                address = self.communicator.get_address() => {
                    address.context("从目录服务获取Master地址失败")?
                }
                _ = shutdown_rx.recv() => {
                    info!("等待Master地址时收到关闭信号");
                    return Ok(());
                }
            },
        };

        let worker_id = match &worker_config.worker_id {
            Some(id) => id.clone(),
            None => default_worker_id(),
        };

        let master = MasterClient::with_timeout(&master_address, worker_config.request_timeout())
            .context("创建Master客户端失败")?;
        let fetcher = HttpJsonFetcher::with_timeout(
            &worker_config.source_url,
            worker_config.request_timeout(),
        )
        .context("创建数据源客户端失败")?;

        info!(
            "Worker {} 连接Master {}，数据源 {}",
            worker_id,
            master.base_url(),
            worker_config.source_url
        );

        let worker = CrawlWorker::new(worker_id, master, Arc::new(fetcher), worker_config);
        worker.run(shutdown_rx).await;
        Ok(())
    }
}

fn default_worker_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "worker".to_string());
    format!("{}-{}", host, std::process::id())
}
