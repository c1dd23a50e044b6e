//! 数据仓储层接口定义
//!
//! 分发核心把任务、执行器、日志和触发记录的存储视为外部协作者，
//! 只依赖这里定义的查找/保存接口：
//!
//! - `TriggerRepository` - 触发器查询
//! - `JobDetailRepository` - 触发器关联的任务
//! - `ExecutorRepository` / `ExecutorDetailRepository` - 执行器分组与机器
//! - `ExecutionLogRepository` - 执行日志
//! - `FiredTriggerRepository` - 执行中的触发记录，以及与日志成对的原子操作
//!
//! 所有接口都是异步的并要求 `Send + Sync`，返回 `SchedulerResult<T>`。

use async_trait::async_trait;

use crate::models::{
    ExecutionLog, ExecutorGroup, FiredTrigger, FiredTriggerKey, JobDetail, LogStatus, Trigger,
    WorkerEndpoint,
};
use crate::SchedulerResult;

#[async_trait]
pub trait TriggerRepository: Send + Sync {
    async fn create(&self, trigger: &Trigger) -> SchedulerResult<Trigger>;

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Trigger>>;

    async fn get_by_ids(&self, ids: &[i64]) -> SchedulerResult<Vec<Trigger>>;
}

#[async_trait]
pub trait JobDetailRepository: Send + Sync {
    async fn create(&self, job: &JobDetail) -> SchedulerResult<JobDetail>;

    /// 查找触发器关联的任务，一个触发器至多关联一个任务
    async fn find_by_trigger_id(&self, trigger_id: i64) -> SchedulerResult<Option<JobDetail>>;
}

#[async_trait]
pub trait ExecutorRepository: Send + Sync {
    async fn create(&self, group: &ExecutorGroup) -> SchedulerResult<ExecutorGroup>;

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<ExecutorGroup>>;
}

#[async_trait]
pub trait ExecutorDetailRepository: Send + Sync {
    async fn create(&self, endpoint: &WorkerEndpoint) -> SchedulerResult<WorkerEndpoint>;

    /// 分组下的机器列表，按ID升序
    async fn list_by_executor(&self, executor_group_id: i64)
        -> SchedulerResult<Vec<WorkerEndpoint>>;

    async fn delete(&self, id: i64) -> SchedulerResult<()>;
}

#[async_trait]
pub trait ExecutionLogRepository: Send + Sync {
    /// 写入日志并返回带ID的快照
    async fn create(&self, log: &ExecutionLog) -> SchedulerResult<ExecutionLog>;

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<ExecutionLog>>;

    /// 仅当库中状态仍为 `expected` 时更新，返回是否更新成功
    async fn update_if_status(
        &self,
        log: &ExecutionLog,
        expected: LogStatus,
    ) -> SchedulerResult<bool>;

    async fn list_by_trigger_name(&self, trigger_name: &str) -> SchedulerResult<Vec<ExecutionLog>>;
}

#[async_trait]
pub trait FiredTriggerRepository: Send + Sync {
    /// 原子地写入 INIT 日志与触发记录，触发记录的 `log_id` 由新日志ID回填
    async fn create_with_log(
        &self,
        log: &ExecutionLog,
        fired: &FiredTrigger,
    ) -> SchedulerResult<(ExecutionLog, FiredTrigger)>;

    /// 原子地删除触发记录并更新日志
    ///
    /// 记录不存在时不修改日志并返回 `false`。
    async fn remove_and_update_log(
        &self,
        key: &FiredTriggerKey,
        log: &ExecutionLog,
    ) -> SchedulerResult<bool>;

    async fn find(&self, key: &FiredTriggerKey) -> SchedulerResult<Option<FiredTrigger>>;

    async fn list_by_trigger_id(&self, trigger_id: i64) -> SchedulerResult<Vec<FiredTrigger>>;

    async fn list(&self) -> SchedulerResult<Vec<FiredTrigger>>;
}
