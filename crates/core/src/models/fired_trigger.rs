use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ExecutionLog, JobDetail, Trigger, WorkerEndpoint};

/// 正在执行中的触发记录
///
/// 存在即表示该触发器在该执行器机器上有一次未完成的执行。
/// 与 INIT 日志一起原子写入，在结果确定时恰好删除一次。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiredTrigger {
    pub id: i64,
    pub trigger_id: i64,
    pub trigger_name: String,
    pub class_name: String,
    pub executor_group_id: i64,
    pub endpoint_id: i64,
    pub log_id: i64,
    pub address: String,
    pub create_time: DateTime<Utc>,
}

impl FiredTrigger {
    /// `log_id` 在与日志一同落库时回填
    pub fn new(trigger: &Trigger, job: &JobDetail, endpoint: &WorkerEndpoint) -> Self {
        Self {
            id: 0,
            trigger_id: trigger.id,
            trigger_name: trigger.name.clone(),
            class_name: job.class_name.clone(),
            executor_group_id: endpoint.executor_group_id,
            endpoint_id: endpoint.id,
            log_id: 0,
            address: endpoint.address.clone(),
            create_time: Utc::now(),
        }
    }

    pub fn key(&self) -> FiredTriggerKey {
        FiredTriggerKey {
            trigger_id: self.trigger_id,
            endpoint_id: self.endpoint_id,
            log_id: self.log_id,
        }
    }
}

/// 定位一条未完成触发记录的键
///
/// 同一触发器可能在同一台机器上有多次未完成执行，因此带上日志ID。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiredTriggerKey {
    pub trigger_id: i64,
    pub endpoint_id: i64,
    pub log_id: i64,
}

impl FiredTriggerKey {
    pub fn for_log(trigger_id: i64, endpoint_id: i64, log: &ExecutionLog) -> Self {
        Self {
            trigger_id,
            endpoint_id,
            log_id: log.id,
        }
    }
}
