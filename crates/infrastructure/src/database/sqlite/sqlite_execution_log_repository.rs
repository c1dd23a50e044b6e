use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tesseract_core::{ExecutionLog, ExecutionLogRepository, LogStatus, SchedulerResult};
use tracing::debug;

pub struct SqliteExecutionLogRepository {
    pool: SqlitePool,
}

impl SqliteExecutionLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn row_to_log(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<ExecutionLog> {
        Ok(ExecutionLog {
            id: row.try_get("id")?,
            trigger_name: row.try_get("trigger_name")?,
            class_name: row.try_get("class_name")?,
            create_time: row.try_get("create_time")?,
            end_time: row.try_get("end_time")?,
            status: row.try_get("status")?,
            address: row.try_get("address")?,
            message: row.try_get("message")?,
            creator: row.try_get("creator")?,
        })
    }
}

pub(crate) const INSERT_LOG_SQL: &str =
    "INSERT INTO execution_logs (trigger_name, class_name, create_time, end_time, status, address, message, creator)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

pub(crate) const UPDATE_LOG_SQL: &str =
    "UPDATE execution_logs SET end_time = ?, status = ?, message = ? WHERE id = ?";

#[async_trait]
impl ExecutionLogRepository for SqliteExecutionLogRepository {
    async fn create(&self, log: &ExecutionLog) -> SchedulerResult<ExecutionLog> {
        let result = sqlx::query(INSERT_LOG_SQL)
            .bind(&log.trigger_name)
            .bind(&log.class_name)
            .bind(log.create_time)
            .bind(log.end_time)
            .bind(log.status)
            .bind(&log.address)
            .bind(&log.message)
            .bind(&log.creator)
            .execute(&self.pool)
            .await?;

        let created = ExecutionLog {
            id: result.last_insert_rowid(),
            ..log.clone()
        };
        debug!(
            "写入执行日志: {} (ID: {}, 状态: {})",
            created.trigger_name, created.id, created.status
        );
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<ExecutionLog>> {
        let row = sqlx::query(
            "SELECT id, trigger_name, class_name, create_time, end_time, status, address, message, creator
             FROM execution_logs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_log).transpose()
    }

    async fn update_if_status(
        &self,
        log: &ExecutionLog,
        expected: LogStatus,
    ) -> SchedulerResult<bool> {
        let result = sqlx::query(
            "UPDATE execution_logs SET end_time = ?, status = ?, message = ? WHERE id = ? AND status = ?",
        )
        .bind(log.end_time)
        .bind(log.status)
        .bind(&log.message)
        .bind(log.id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_trigger_name(&self, trigger_name: &str) -> SchedulerResult<Vec<ExecutionLog>> {
        let rows = sqlx::query(
            "SELECT id, trigger_name, class_name, create_time, end_time, status, address, message, creator
             FROM execution_logs WHERE trigger_name = ? ORDER BY id",
        )
        .bind(trigger_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_log).collect()
    }
}
