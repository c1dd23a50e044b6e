use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Trigger;
use crate::{SchedulerError, SchedulerResult};

/// 未选定执行器机器时日志中的地址占位
pub const NULL_ADDRESS: &str = "-";

pub const MSG_NO_RUNNABLE_JOB: &str = "no runnable job found";
pub const MSG_NO_USABLE_EXECUTOR: &str = "no usable executor found";
pub const MSG_NO_LIVE_MACHINE: &str = "no live machine under executor";
pub const MSG_WAITING_FOR_EXECUTOR: &str = "waiting for executor";

pub const CREATOR_SCHEDULER: &str = "scheduler";
pub const CREATOR_MANUAL: &str = "manual";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LogStatus {
    #[serde(rename = "INIT")]
    Init,
    #[serde(rename = "WAIT")]
    Wait,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAIL")]
    Fail,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Init => "INIT",
            LogStatus::Wait => "WAIT",
            LogStatus::Success => "SUCCESS",
            LogStatus::Fail => "FAIL",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LogStatus::Success | LogStatus::Fail)
    }

    /// SUCCESS 允许直接由 INIT 到达：执行器回调可能先于 WAIT 落库
    pub fn can_transition_to(&self, next: LogStatus) -> bool {
        match self {
            LogStatus::Init => next != LogStatus::Init,
            LogStatus::Wait => next.is_terminal(),
            LogStatus::Success | LogStatus::Fail => false,
        }
    }
}

impl std::str::FromStr for LogStatus {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INIT" => Ok(LogStatus::Init),
            "WAIT" => Ok(LogStatus::Wait),
            "SUCCESS" => Ok(LogStatus::Success),
            "FAIL" => Ok(LogStatus::Fail),
            _ => Err(SchedulerError::Serialization(serde::de::Error::custom(
                format!("无效的日志状态: {s}"),
            ))),
        }
    }
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Sqlite> for LogStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for LogStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "INIT" => Ok(LogStatus::Init),
            "WAIT" => Ok(LogStatus::Wait),
            "SUCCESS" => Ok(LogStatus::Success),
            "FAIL" => Ok(LogStatus::Fail),
            _ => Err(format!("Invalid log status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for LogStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 一次分发尝试的执行日志
///
/// 分发开始时创建，终态（SUCCESS/FAIL）只写入一次，之后作为历史不可变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLog {
    pub id: i64,
    pub trigger_name: String,
    pub class_name: String,
    pub create_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: LogStatus,
    pub address: String,
    pub message: String,
    pub creator: String,
}

impl ExecutionLog {
    /// 路由完成、即将发送请求时的初始日志
    pub fn init(trigger: &Trigger, class_name: &str, address: &str, is_once: bool) -> Self {
        Self {
            id: 0,
            trigger_name: trigger.name.clone(),
            class_name: class_name.to_string(),
            create_time: Utc::now(),
            end_time: None,
            status: LogStatus::Init,
            address: address.to_string(),
            message: MSG_WAITING_FOR_EXECUTOR.to_string(),
            creator: creator_for(is_once).to_string(),
        }
    }

    /// 分发前即失败（任务、执行器或机器缺失）的日志，没有对应的触发记录
    pub fn failed_before_dispatch(
        trigger: &Trigger,
        class_name: Option<&str>,
        reason: &str,
        is_once: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            trigger_name: trigger.name.clone(),
            class_name: class_name.unwrap_or_default().to_string(),
            create_time: now,
            end_time: Some(now),
            status: LogStatus::Fail,
            address: NULL_ADDRESS.to_string(),
            message: reason.to_string(),
            creator: creator_for(is_once).to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 状态变更，终态时写入结束时间
    pub fn transition(self, to: LogStatus, message: Option<String>) -> SchedulerResult<Self> {
        if !self.status.can_transition_to(to) {
            return Err(SchedulerError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }
        let end_time = if to.is_terminal() {
            Some(Utc::now())
        } else {
            self.end_time
        };
        Ok(Self {
            status: to,
            end_time,
            message: message.unwrap_or(self.message.clone()),
            ..self
        })
    }

    pub fn fail(self, reason: impl Into<String>) -> SchedulerResult<Self> {
        self.transition(LogStatus::Fail, Some(reason.into()))
    }

    pub fn waiting(self) -> SchedulerResult<Self> {
        self.transition(LogStatus::Wait, None)
    }

    pub fn succeed(self, message: Option<String>) -> SchedulerResult<Self> {
        self.transition(LogStatus::Success, message)
    }
}

fn creator_for(is_once: bool) -> &'static str {
    if is_once {
        CREATOR_MANUAL
    } else {
        CREATOR_SCHEDULER
    }
}
