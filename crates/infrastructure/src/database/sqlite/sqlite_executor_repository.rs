use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tesseract_core::{
    ExecutorDetailRepository, ExecutorGroup, ExecutorRepository, SchedulerResult, WorkerEndpoint,
};
use tracing::debug;

pub struct SqliteExecutorRepository {
    pool: SqlitePool,
}

impl SqliteExecutorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutorRepository for SqliteExecutorRepository {
    async fn create(&self, group: &ExecutorGroup) -> SchedulerResult<ExecutorGroup> {
        let result = sqlx::query(
            "INSERT INTO executor_groups (name, description, create_time) VALUES (?, ?, ?)",
        )
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.create_time)
        .execute(&self.pool)
        .await?;

        Ok(ExecutorGroup {
            id: result.last_insert_rowid(),
            ..group.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<ExecutorGroup>> {
        let row = sqlx::query(
            "SELECT id, name, description, create_time FROM executor_groups WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(ExecutorGroup {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                create_time: row.try_get("create_time")?,
            })),
            None => Ok(None),
        }
    }
}

pub struct SqliteExecutorDetailRepository {
    pool: SqlitePool,
}

impl SqliteExecutorDetailRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_endpoint(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<WorkerEndpoint> {
        Ok(WorkerEndpoint {
            id: row.try_get("id")?,
            executor_group_id: row.try_get("executor_group_id")?,
            address: row.try_get("address")?,
            load_factor: row.try_get("load_factor")?,
            create_time: row.try_get("create_time")?,
            update_time: row.try_get("update_time")?,
        })
    }
}

#[async_trait]
impl ExecutorDetailRepository for SqliteExecutorDetailRepository {
    async fn create(&self, endpoint: &WorkerEndpoint) -> SchedulerResult<WorkerEndpoint> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO executor_details (executor_group_id, address, load_factor, create_time, update_time)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(endpoint.executor_group_id)
        .bind(&endpoint.address)
        .bind(endpoint.load_factor)
        .bind(endpoint.create_time)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(
            "注册执行器机器: {} (分组: {})",
            endpoint.address, endpoint.executor_group_id
        );
        Ok(WorkerEndpoint {
            id: result.last_insert_rowid(),
            update_time: now,
            ..endpoint.clone()
        })
    }

    async fn list_by_executor(
        &self,
        executor_group_id: i64,
    ) -> SchedulerResult<Vec<WorkerEndpoint>> {
        let rows = sqlx::query(
            "SELECT id, executor_group_id, address, load_factor, create_time, update_time
             FROM executor_details WHERE executor_group_id = ? ORDER BY id",
        )
        .bind(executor_group_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_endpoint).collect()
    }

    async fn delete(&self, id: i64) -> SchedulerResult<()> {
        sqlx::query("DELETE FROM executor_details WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
