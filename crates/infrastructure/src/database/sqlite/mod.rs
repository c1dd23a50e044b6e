pub mod sqlite_execution_log_repository;
pub mod sqlite_executor_repository;
pub mod sqlite_fired_trigger_repository;
pub mod sqlite_job_detail_repository;
pub mod sqlite_trigger_repository;

pub use sqlite_execution_log_repository::SqliteExecutionLogRepository;
pub use sqlite_executor_repository::{SqliteExecutorDetailRepository, SqliteExecutorRepository};
pub use sqlite_fired_trigger_repository::SqliteFiredTriggerRepository;
pub use sqlite_job_detail_repository::SqliteJobDetailRepository;
pub use sqlite_trigger_repository::SqliteTriggerRepository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tesseract_core::{DatabaseConfig, SchedulerResult};
use tracing::{debug, info};

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> SchedulerResult<Self> {
        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(1800))
            .connect_with(connect_options)
            .await?;

        info!("数据库连接池已创建: {}", config.url);
        Ok(Self { pool })
    }

    /// 复用已有连接池，测试中配合 `sqlite::memory:` 使用
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 运行数据库迁移
    pub async fn migrate(&self) -> SchedulerResult<()> {
        run_migrations(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub async fn run_migrations(pool: &SqlitePool) -> SchedulerResult<()> {
    debug!("Running SQLite database migrations");

    let tables = [
        r#"
        CREATE TABLE IF NOT EXISTS triggers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            executor_group_id INTEGER NOT NULL,
            sharding_index INTEGER NOT NULL DEFAULT 0,
            routing_strategy TEXT NOT NULL DEFAULT 'hash',
            create_time DATETIME NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS job_details (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            trigger_id INTEGER NOT NULL UNIQUE,
            class_name TEXT NOT NULL,
            creator TEXT NOT NULL,
            create_time DATETIME NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS executor_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            create_time DATETIME NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS executor_details (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            executor_group_id INTEGER NOT NULL,
            address TEXT NOT NULL,
            load_factor REAL NOT NULL DEFAULT 0,
            create_time DATETIME NOT NULL,
            update_time DATETIME NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS execution_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            trigger_name TEXT NOT NULL,
            class_name TEXT NOT NULL,
            create_time DATETIME NOT NULL,
            end_time DATETIME,
            status TEXT NOT NULL,
            address TEXT NOT NULL,
            message TEXT NOT NULL,
            creator TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS fired_triggers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            trigger_id INTEGER NOT NULL,
            trigger_name TEXT NOT NULL,
            class_name TEXT NOT NULL,
            executor_group_id INTEGER NOT NULL,
            endpoint_id INTEGER NOT NULL,
            log_id INTEGER NOT NULL UNIQUE,
            address TEXT NOT NULL,
            create_time DATETIME NOT NULL
        )
        "#,
    ];

    for table_sql in tables {
        sqlx::query(table_sql).execute(pool).await?;
    }

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_executor_details_group ON executor_details(executor_group_id)",
        "CREATE INDEX IF NOT EXISTS idx_execution_logs_trigger_name ON execution_logs(trigger_name)",
        "CREATE INDEX IF NOT EXISTS idx_execution_logs_status ON execution_logs(status)",
        "CREATE INDEX IF NOT EXISTS idx_fired_triggers_trigger ON fired_triggers(trigger_id, endpoint_id)",
    ];

    for index_sql in indexes {
        sqlx::query(index_sql).execute(pool).await?;
    }

    debug!("Successfully completed SQLite database migrations");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    /// 单连接的内存库，保证所有查询落在同一个数据库上
    pub async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        super::run_migrations(&pool).await.unwrap();
        pool
    }
}
