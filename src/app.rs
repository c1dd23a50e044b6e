use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tracing::info;

use tesseract_api::{create_app, AppState};
use tesseract_core::{AppConfig, ExecutionLogRepository};
use tesseract_dispatcher::{DispatchRepositories, TriggerDispatcher};
use tesseract_infrastructure::{
    DatabaseManager, HttpExecutorTransport, SqliteExecutionLogRepository,
    SqliteExecutorDetailRepository, SqliteExecutorRepository, SqliteFiredTriggerRepository,
    SqliteJobDetailRepository, SqliteTriggerRepository,
};

/// 装配完成的分发服务：数据库、分发引擎与回调API
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    dispatcher: Arc<TriggerDispatcher>,
    log_repo: Arc<dyn ExecutionLogRepository>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let database = DatabaseManager::new(&config.database)
            .await
            .context("连接数据库失败")?;
        database.migrate().await.context("数据库迁移失败")?;
        Self::with_database(config, database)
    }

    /// 使用已建立的连接池装配，连接池需已完成迁移
    pub fn from_pool(config: AppConfig, pool: SqlitePool) -> Result<Self> {
        Self::with_database(config, DatabaseManager::from_pool(pool))
    }

    fn with_database(config: AppConfig, database: DatabaseManager) -> Result<Self> {
        let pool = database.pool().clone();
        let log_repo: Arc<dyn ExecutionLogRepository> =
            Arc::new(SqliteExecutionLogRepository::new(pool.clone()));

        let repos = DispatchRepositories {
            triggers: Arc::new(SqliteTriggerRepository::new(pool.clone())),
            jobs: Arc::new(SqliteJobDetailRepository::new(pool.clone())),
            executors: Arc::new(SqliteExecutorRepository::new(pool.clone())),
            endpoints: Arc::new(SqliteExecutorDetailRepository::new(pool.clone())),
            logs: log_repo.clone(),
            fired: Arc::new(SqliteFiredTriggerRepository::new(pool)),
        };

        let transport =
            HttpExecutorTransport::new(&config.transport).context("创建执行器传输客户端失败")?;
        let dispatcher = Arc::new(TriggerDispatcher::new(
            repos,
            Arc::new(transport),
            &config.dispatcher,
        ));

        info!(
            "分发引擎已就绪: core_workers={}, max_workers={}, queue_capacity={}",
            config.dispatcher.core_workers,
            config.dispatcher.max_workers,
            config.dispatcher.queue_capacity
        );

        Ok(Self {
            config,
            database,
            dispatcher,
            log_repo,
        })
    }

    pub fn dispatcher(&self) -> &Arc<TriggerDispatcher> {
        &self.dispatcher
    }

    pub fn router(&self) -> axum::Router {
        create_app(AppState {
            dispatcher: self.dispatcher.clone(),
            log_repo: self.log_repo.clone(),
        })
    }

    /// 运行回调与分发API，收到关闭信号后等待分发引擎关闭
    pub async fn serve(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if self.config.api.enabled {
            let listener = tokio::net::TcpListener::bind(&self.config.api.bind_address)
                .await
                .with_context(|| format!("绑定API地址失败: {}", self.config.api.bind_address))?;
            info!("API服务监听于 {}", listener.local_addr()?);

            axum::serve(listener, self.router())
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .context("API服务运行失败")?;
        } else {
            info!("API已禁用，仅等待关闭信号");
            let _ = shutdown_rx.recv().await;
        }

        self.dispatcher.shutdown().await;
        Ok(())
    }

    /// 一次性分发指定触发器并等待在途任务结束
    pub async fn fire(&self, trigger_ids: &[i64]) -> Result<usize> {
        let found = self
            .dispatcher
            .dispatch_by_ids(trigger_ids, true)
            .await
            .context("分发触发器失败")?;
        info!("已提交 {}/{} 个触发器", found, trigger_ids.len());
        self.dispatcher.shutdown().await;
        Ok(found)
    }

    /// 关闭数据库连接池，需在分发引擎关闭之后调用
    pub async fn close(&self) {
        self.database.close().await;
        info!("分发服务已停止");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use tesseract_core::{LogStatus, Trigger, TriggerRepository};
    use tesseract_infrastructure::run_migrations;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.api.bind_address = "127.0.0.1:0".to_string();
        config.dispatcher.core_workers = 2;
        config.dispatcher.max_workers = 4;
        config.dispatcher.shutdown_timeout_seconds = 5;
        config
    }

    #[tokio::test]
    async fn test_fire_records_failure_for_trigger_without_job() {
        let pool = memory_pool().await;
        let trigger = SqliteTriggerRepository::new(pool.clone())
            .create(&Trigger::new(0, "orphan", 1, "hash"))
            .await
            .unwrap();

        let app = Application::from_pool(test_config(), pool.clone()).unwrap();
        let found = app.fire(&[trigger.id, 9999]).await.unwrap();
        assert_eq!(found, 1);
        assert!(app.dispatcher().pool().is_shutdown());

        let logs = SqliteExecutionLogRepository::new(pool)
            .list_by_trigger_name("orphan")
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::Fail);
        assert_eq!(logs[0].creator, tesseract_core::CREATOR_MANUAL);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown_signal() {
        let pool = memory_pool().await;
        let app = Arc::new(Application::from_pool(test_config(), pool).unwrap());
        let (tx, rx) = broadcast::channel(1);

        let server = {
            let app = app.clone();
            tokio::spawn(async move { app.serve(rx).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(()).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(app.dispatcher().pool().is_shutdown());
    }
}
