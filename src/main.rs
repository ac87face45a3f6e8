use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crawler::app::{AppMode, Application};
use crawler::shutdown::ShutdownManager;
use crawler_core::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("crawler")
        .version("1.0.0")
        .about("分布式爬取任务协调系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .default_value(crawler_core::config::DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["master", "worker"])
                .default_value("master"),
        )
        .arg(
            Arg::new("worker-id")
                .long("worker-id")
                .value_name("ID")
                .help("Worker ID (仅在worker模式下使用，默认 主机名-进程号)"),
        )
        .arg(
            Arg::new("master")
                .long("master")
                .value_name("ADDRESS")
                .help("Master地址 (仅在worker模式下使用，跳过目录服务发现)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，默认使用配置文件中的 observability.log_level")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(crawler_core::config::DEFAULT_CONFIG_PATH);
    let mode_str = matches
        .get_one::<String>("mode")
        .map(String::as_str)
        .unwrap_or("master");
    let worker_id = matches.get_one::<String>("worker-id");
    let master_override = matches.get_one::<String>("master").cloned();
    let log_format = matches
        .get_one::<String>("log-format")
        .map(String::as_str)
        .unwrap_or("pretty");

    // 加载配置
    let mut config = AppConfig::load(Some(config_path))
        .with_context(|| format!("加载配置文件失败: {config_path}"))?;

    // 初始化日志系统
    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.observability.log_level.clone());
    init_logging(&log_level, log_format)?;

    info!("启动分布式爬取任务协调系统");
    info!("配置文件: {config_path}");
    info!("运行模式: {mode_str}");

    if let Some(id) = worker_id {
        info!("Worker ID: {}", id);
        config.worker.worker_id = Some(id.clone());
    }

    let app_mode: AppMode = mode_str.parse()?;

    // 创建应用实例
    let app = Application::new(config, app_mode, master_override)?;
    let unregister_hook = app.unregister_hook();

    // 创建优雅关闭管理器
    let shutdown_manager = ShutdownManager::new();

    // 启动应用
    let mut app_handle = {
        let app = Arc::new(app);
        let shutdown_rx = shutdown_manager.subscribe().await;

        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    // 等待关闭信号或应用自行退出
    let finished = tokio::select! {
        result = &mut app_handle => Some(result),
        _ = wait_for_shutdown_signal() => None,
    };

    let outcome = match finished {
        Some(Ok(Ok(()))) => {
            info!("应用已退出");
            Ok(())
        }
        Some(Ok(Err(e))) => {
            error!("应用运行失败: {e:#}");
            Err(e)
        }
        Some(Err(e)) => {
            error!("应用任务异常终止: {e}");
            Err(anyhow::Error::new(e).context("应用任务异常终止"))
        }
        None => {
            info!("收到关闭信号，开始优雅关闭...");

            // 触发关闭
            shutdown_manager.shutdown().await;

            // 等待应用关闭，设置超时
            match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
                Ok(Ok(Ok(()))) => info!("应用已优雅关闭"),
                Ok(Ok(Err(e))) => error!("应用关闭时发生错误: {e:#}"),
                Ok(Err(e)) => error!("应用任务异常终止: {e}"),
                Err(_) => warn!("应用关闭超时，强制退出"),
            }
            Ok(())
        }
    };

    if let Some(hook) = unregister_hook {
        hook.fire().await;
    }

    info!("分布式爬取任务协调系统已退出");
    outcome
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
