use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use tesseract::{wait_for_shutdown_signal, Application, ShutdownManager};
use tesseract_core::{AppConfig, ObservabilityConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("tesseract")
        .version(env!("CARGO_PKG_VERSION"))
        .about("分布式任务调度系统 - 触发器分发核心")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，缺省时查找 config/tesseract.toml")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand(Command::new("serve").about("启动回调与分发API"))
        .subcommand(
            Command::new("fire")
                .about("一次性分发指定触发器")
                .arg(
                    Arg::new("trigger-ids")
                        .value_name("TRIGGER_ID")
                        .required(true)
                        .action(ArgAction::Append)
                        .value_parser(clap::value_parser!(i64)),
                ),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");
    let mut config = AppConfig::load(config_path.map(String::as_str))
        .with_context(|| format!("加载配置失败: {config_path:?}"))?;

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.observability.log_format = format.clone();
    }

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    )?;
    init_metrics(&config.observability)?;

    info!("启动分布式任务调度系统");

    let app = Application::new(config).await?;

    match matches.subcommand() {
        Some(("fire", sub)) => {
            let ids: Vec<i64> = sub
                .get_many::<i64>("trigger-ids")
                .map(|ids| ids.copied().collect())
                .unwrap_or_default();
            let found = app.fire(&ids).await?;
            if found < ids.len() {
                warn!("有 {} 个触发器不存在", ids.len() - found);
            }
            app.close().await;
        }
        _ => serve(Arc::new(app)).await,
    }

    info!("分布式任务调度系统已退出");
    Ok(())
}

async fn serve(app: Arc<Application>) {
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let app = Arc::clone(&app);
        let shutdown_rx = shutdown_manager.subscribe().await;
        tokio::spawn(async move {
            if let Err(e) = app.serve(shutdown_rx).await {
                error!("应用运行失败: {e:#}");
            }
        })
    };

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(60), app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => {
            warn!("应用关闭超时，强制关闭分发引擎");
            app.dispatcher().shutdown_now().await;
        }
    }
    app.close().await;
}

fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
        _ => return Err(anyhow::anyhow!("不支持的日志格式: {log_format}")),
    }

    Ok(())
}

/// 启用时安装 Prometheus 导出器
fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.metrics_enabled {
        return Ok(());
    }

    let addr: std::net::SocketAddr = config
        .metrics_bind_address
        .parse()
        .with_context(|| format!("指标导出地址无效: {}", config.metrics_bind_address))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("安装Prometheus导出器失败: {e}"))?;

    info!("Prometheus 指标导出于 {addr}");
    Ok(())
}
