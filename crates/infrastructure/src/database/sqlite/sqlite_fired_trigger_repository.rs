use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tesseract_core::{
    ExecutionLog, FiredTrigger, FiredTriggerKey, FiredTriggerRepository, SchedulerResult,
};
use tracing::{debug, warn};

use super::sqlite_execution_log_repository::{INSERT_LOG_SQL, UPDATE_LOG_SQL};

/// 触发记录仓储
///
/// 触发记录总是与执行日志成对变更，两个原子操作都在同一个事务里完成：
/// 写入 INIT 日志 + 触发记录，删除触发记录 + 更新日志。
pub struct SqliteFiredTriggerRepository {
    pool: SqlitePool,
}

impl SqliteFiredTriggerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_fired(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<FiredTrigger> {
        Ok(FiredTrigger {
            id: row.try_get("id")?,
            trigger_id: row.try_get("trigger_id")?,
            trigger_name: row.try_get("trigger_name")?,
            class_name: row.try_get("class_name")?,
            executor_group_id: row.try_get("executor_group_id")?,
            endpoint_id: row.try_get("endpoint_id")?,
            log_id: row.try_get("log_id")?,
            address: row.try_get("address")?,
            create_time: row.try_get("create_time")?,
        })
    }
}

const SELECT_FIRED_SQL: &str =
    "SELECT id, trigger_id, trigger_name, class_name, executor_group_id, endpoint_id, log_id, address, create_time
     FROM fired_triggers";

#[async_trait]
impl FiredTriggerRepository for SqliteFiredTriggerRepository {
    async fn create_with_log(
        &self,
        log: &ExecutionLog,
        fired: &FiredTrigger,
    ) -> SchedulerResult<(ExecutionLog, FiredTrigger)> {
        let mut tx = self.pool.begin().await?;

        let log_id = sqlx::query(INSERT_LOG_SQL)
            .bind(&log.trigger_name)
            .bind(&log.class_name)
            .bind(log.create_time)
            .bind(log.end_time)
            .bind(log.status)
            .bind(&log.address)
            .bind(&log.message)
            .bind(&log.creator)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        let fired_id = sqlx::query(
            "INSERT INTO fired_triggers (trigger_id, trigger_name, class_name, executor_group_id, endpoint_id, log_id, address, create_time)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(fired.trigger_id)
        .bind(&fired.trigger_name)
        .bind(&fired.class_name)
        .bind(fired.executor_group_id)
        .bind(fired.endpoint_id)
        .bind(log_id)
        .bind(&fired.address)
        .bind(fired.create_time)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        debug!(
            "写入触发记录: 触发器 {} -> {} (日志ID: {})",
            fired.trigger_id, fired.address, log_id
        );

        Ok((
            ExecutionLog {
                id: log_id,
                ..log.clone()
            },
            FiredTrigger {
                id: fired_id,
                log_id,
                ..fired.clone()
            },
        ))
    }

    async fn remove_and_update_log(
        &self,
        key: &FiredTriggerKey,
        log: &ExecutionLog,
    ) -> SchedulerResult<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM fired_triggers WHERE trigger_id = ? AND endpoint_id = ? AND log_id = ?",
        )
        .bind(key.trigger_id)
        .bind(key.endpoint_id)
        .bind(key.log_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            warn!(
                "触发记录不存在，执行结果已被处理: trigger={}, endpoint={}, log={}",
                key.trigger_id, key.endpoint_id, key.log_id
            );
            return Ok(false);
        }

        sqlx::query(UPDATE_LOG_SQL)
            .bind(log.end_time)
            .bind(log.status)
            .bind(&log.message)
            .bind(log.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn find(&self, key: &FiredTriggerKey) -> SchedulerResult<Option<FiredTrigger>> {
        let row = sqlx::query(&format!(
            "{SELECT_FIRED_SQL} WHERE trigger_id = ? AND endpoint_id = ? AND log_id = ?"
        ))
        .bind(key.trigger_id)
        .bind(key.endpoint_id)
        .bind(key.log_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_fired).transpose()
    }

    async fn list_by_trigger_id(&self, trigger_id: i64) -> SchedulerResult<Vec<FiredTrigger>> {
        let rows = sqlx::query(&format!(
            "{SELECT_FIRED_SQL} WHERE trigger_id = ? ORDER BY id"
        ))
        .bind(trigger_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_fired).collect()
    }

    async fn list(&self) -> SchedulerResult<Vec<FiredTrigger>> {
        let rows = sqlx::query(&format!("{SELECT_FIRED_SQL} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_fired).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::SqliteExecutionLogRepository;
    use tesseract_core::{
        ExecutionLogRepository, JobDetail, LogStatus, Trigger, WorkerEndpoint,
    };

    use crate::database::sqlite::test_support::setup_test_db;

    fn fixture() -> (Trigger, JobDetail, WorkerEndpoint) {
        let trigger = Trigger::new(5, "billing-close", 2, "hash");
        let job = JobDetail::new(5, "demo.BillingJob");
        let mut endpoint = WorkerEndpoint::new(2, "10.0.0.9:8081");
        endpoint.id = 12;
        (trigger, job, endpoint)
    }

    #[tokio::test]
    async fn test_create_with_log_links_ids() {
        let pool = setup_test_db().await;
        let repo = SqliteFiredTriggerRepository::new(pool.clone());
        let logs = SqliteExecutionLogRepository::new(pool);
        let (trigger, job, endpoint) = fixture();

        let log = ExecutionLog::init(&trigger, &job.class_name, &endpoint.address, false);
        let fired = FiredTrigger::new(&trigger, &job, &endpoint);
        let (log, fired) = repo.create_with_log(&log, &fired).await.unwrap();

        assert!(log.id > 0);
        assert_eq!(fired.log_id, log.id);
        assert_eq!(
            logs.get_by_id(log.id).await.unwrap().unwrap().status,
            LogStatus::Init
        );
        let found = repo.find(&fired.key()).await.unwrap().unwrap();
        assert_eq!(found.id, fired.id);
        assert_eq!(found.address, "10.0.0.9:8081");
        assert_eq!(repo.list_by_trigger_id(5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_and_update_log_happens_once() {
        let pool = setup_test_db().await;
        let repo = SqliteFiredTriggerRepository::new(pool.clone());
        let logs = SqliteExecutionLogRepository::new(pool);
        let (trigger, job, endpoint) = fixture();

        let (log, fired) = repo
            .create_with_log(
                &ExecutionLog::init(&trigger, &job.class_name, &endpoint.address, false),
                &FiredTrigger::new(&trigger, &job, &endpoint),
            )
            .await
            .unwrap();
        let key = fired.key();

        let failed = log.clone().fail("connection refused").unwrap();
        assert!(repo.remove_and_update_log(&key, &failed).await.unwrap());
        assert!(repo.find(&key).await.unwrap().is_none());

        let stored = logs.get_by_id(log.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LogStatus::Fail);
        assert_eq!(stored.message, "connection refused");

        // 第二次处理不修改日志
        let late = log.succeed(Some("done".to_string())).unwrap();
        assert!(!repo.remove_and_update_log(&key, &late).await.unwrap());
        let stored = logs.get_by_id(late.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LogStatus::Fail);
    }

    #[tokio::test]
    async fn test_key_distinguishes_concurrent_runs() {
        let pool = setup_test_db().await;
        let repo = SqliteFiredTriggerRepository::new(pool);
        let (trigger, job, endpoint) = fixture();

        let mut keys = Vec::new();
        for _ in 0..2 {
            let (_, fired) = repo
                .create_with_log(
                    &ExecutionLog::init(&trigger, &job.class_name, &endpoint.address, false),
                    &FiredTrigger::new(&trigger, &job, &endpoint),
                )
                .await
                .unwrap();
            keys.push(fired.key());
        }
        assert_ne!(keys[0], keys[1]);
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }
}
