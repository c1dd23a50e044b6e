use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tesseract_core::{SchedulerResult, Trigger, TriggerRepository};
use tracing::debug;

pub struct SqliteTriggerRepository {
    pool: SqlitePool,
}

impl SqliteTriggerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_trigger(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<Trigger> {
        Ok(Trigger {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            executor_group_id: row.try_get("executor_group_id")?,
            sharding_index: row.try_get("sharding_index")?,
            routing_strategy: row.try_get("routing_strategy")?,
            create_time: row.try_get("create_time")?,
        })
    }
}

#[async_trait]
impl TriggerRepository for SqliteTriggerRepository {
    async fn create(&self, trigger: &Trigger) -> SchedulerResult<Trigger> {
        let result = sqlx::query(
            "INSERT INTO triggers (name, executor_group_id, sharding_index, routing_strategy, create_time)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&trigger.name)
        .bind(trigger.executor_group_id)
        .bind(trigger.sharding_index)
        .bind(&trigger.routing_strategy)
        .bind(trigger.create_time)
        .execute(&self.pool)
        .await?;

        let created = Trigger {
            id: result.last_insert_rowid(),
            ..trigger.clone()
        };
        debug!("创建触发器成功: {} (ID: {})", created.name, created.id);
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Trigger>> {
        let row = sqlx::query(
            "SELECT id, name, executor_group_id, sharding_index, routing_strategy, create_time
             FROM triggers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_trigger).transpose()
    }

    async fn get_by_ids(&self, ids: &[i64]) -> SchedulerResult<Vec<Trigger>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, name, executor_group_id, sharding_index, routing_strategy, create_time
             FROM triggers WHERE id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_trigger).collect()
    }
}
