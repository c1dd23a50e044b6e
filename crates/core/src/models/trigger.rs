use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 已触发的触发器
///
/// 一旦触发即不可变，决定运行哪个任务以及由哪个执行器分组执行。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub id: i64,
    pub name: String,
    pub executor_group_id: i64,
    pub sharding_index: i32,
    /// 路由策略标识，未知值回退到哈希策略
    pub routing_strategy: String,
    pub create_time: DateTime<Utc>,
}

impl Trigger {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        executor_group_id: i64,
        routing_strategy: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            executor_group_id,
            sharding_index: 0,
            routing_strategy: routing_strategy.into(),
            create_time: Utc::now(),
        }
    }

    pub fn with_sharding_index(mut self, sharding_index: i32) -> Self {
        self.sharding_index = sharding_index;
        self
    }
}
