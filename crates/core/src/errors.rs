use thiserror::Error;

use crate::models::LogStatus;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("执行日志未找到: {id}")]
    LogNotFound { id: i64 },

    #[error("没有可供路由的执行器节点")]
    NoCandidates,

    #[error("非法的日志状态变更: {from:?} -> {to:?}")]
    InvalidStateTransition { from: LogStatus, to: LogStatus },

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("调度线程池已关闭")]
    PoolShutdown,

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// 是否为存储层错误
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            SchedulerError::Database(_) | SchedulerError::DatabaseOperation(_)
        )
    }
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
