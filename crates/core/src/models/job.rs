use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 触发器关联的可运行任务
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub id: i64,
    pub trigger_id: i64,
    /// 执行器端可运行单元的标识
    pub class_name: String,
    pub creator: String,
    pub create_time: DateTime<Utc>,
}

impl JobDetail {
    pub fn new(trigger_id: i64, class_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            trigger_id,
            class_name: class_name.into(),
            creator: "admin".to_string(),
            create_time: Utc::now(),
        }
    }
}
