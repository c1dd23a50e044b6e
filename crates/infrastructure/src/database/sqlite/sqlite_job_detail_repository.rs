use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tesseract_core::{JobDetail, JobDetailRepository, SchedulerResult};
use tracing::debug;

pub struct SqliteJobDetailRepository {
    pool: SqlitePool,
}

impl SqliteJobDetailRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<JobDetail> {
        Ok(JobDetail {
            id: row.try_get("id")?,
            trigger_id: row.try_get("trigger_id")?,
            class_name: row.try_get("class_name")?,
            creator: row.try_get("creator")?,
            create_time: row.try_get("create_time")?,
        })
    }
}

#[async_trait]
impl JobDetailRepository for SqliteJobDetailRepository {
    async fn create(&self, job: &JobDetail) -> SchedulerResult<JobDetail> {
        let result = sqlx::query(
            "INSERT INTO job_details (trigger_id, class_name, creator, create_time) VALUES (?, ?, ?, ?)",
        )
        .bind(job.trigger_id)
        .bind(&job.class_name)
        .bind(&job.creator)
        .bind(job.create_time)
        .execute(&self.pool)
        .await?;

        debug!("创建任务成功: {} -> 触发器 {}", job.class_name, job.trigger_id);
        Ok(JobDetail {
            id: result.last_insert_rowid(),
            ..job.clone()
        })
    }

    async fn find_by_trigger_id(&self, trigger_id: i64) -> SchedulerResult<Option<JobDetail>> {
        let row = sqlx::query(
            "SELECT id, trigger_id, class_name, creator, create_time FROM job_details WHERE trigger_id = ?",
        )
        .bind(trigger_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_job).transpose()
    }
}
