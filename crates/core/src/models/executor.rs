use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 执行器分组：服务同一类任务的一组执行器机器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorGroup {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub create_time: DateTime<Utc>,
}

impl ExecutorGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: String::new(),
            create_time: Utc::now(),
        }
    }
}

/// 执行器分组下的一台机器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerEndpoint {
    pub id: i64,
    pub executor_group_id: i64,
    /// host:port
    pub address: String,
    /// 负载因子，越小越空闲
    pub load_factor: f64,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl WorkerEndpoint {
    pub fn new(executor_group_id: i64, address: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            executor_group_id,
            address: address.into(),
            load_factor: 0.0,
            create_time: now,
            update_time: now,
        }
    }
}
