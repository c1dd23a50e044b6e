//! 执行状态跟踪
//!
//! 执行日志与触发记录成对创建，触发记录在结果确定时恰好删除一次。
//! 分发方（失败）与回调方（成功）谁先得知结果谁负责收尾，后到者得到
//! `Resolution::AlreadyResolved`。

use std::sync::Arc;

use tracing::debug;

use tesseract_core::{
    ExecutionLog, ExecutionLogRepository, FiredTrigger, FiredTriggerKey, FiredTriggerRepository,
    JobDetail, LogStatus, SchedulerError, SchedulerResult, Trigger, WorkerEndpoint,
};
use tesseract_infrastructure::StructuredLogger;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// 本次调用删除了触发记录并写入了终态日志
    Resolved(ExecutionLog),
    /// 触发记录已不存在，日志未被修改
    AlreadyResolved,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

#[derive(Clone)]
pub struct ExecutionTracker {
    log_repo: Arc<dyn ExecutionLogRepository>,
    fired_repo: Arc<dyn FiredTriggerRepository>,
}

impl ExecutionTracker {
    pub fn new(
        log_repo: Arc<dyn ExecutionLogRepository>,
        fired_repo: Arc<dyn FiredTriggerRepository>,
    ) -> Self {
        Self {
            log_repo,
            fired_repo,
        }
    }

    /// 原子地写入 INIT 日志与触发记录
    pub async fn begin(
        &self,
        trigger: &Trigger,
        job: &JobDetail,
        endpoint: &WorkerEndpoint,
        is_once: bool,
    ) -> SchedulerResult<(ExecutionLog, FiredTrigger)> {
        let log = ExecutionLog::init(trigger, &job.class_name, &endpoint.address, is_once);
        let fired = FiredTrigger::new(trigger, job, endpoint);
        let (log, fired) = self.fired_repo.create_with_log(&log, &fired).await?;

        debug!(
            "开始执行: 触发器 {} -> {} (日志ID: {})",
            trigger.name, endpoint.address, log.id
        );
        Ok((log, fired))
    }

    /// 找不到任务、执行器或机器时写入一条 FAIL 日志，不创建触发记录
    pub async fn fail_before_dispatch(
        &self,
        trigger: &Trigger,
        class_name: Option<&str>,
        reason: &str,
        is_once: bool,
    ) -> SchedulerResult<ExecutionLog> {
        let log = ExecutionLog::failed_before_dispatch(trigger, class_name, reason, is_once);
        self.log_repo.create(&log).await
    }

    /// 分发失败：日志置为 FAIL 并删除触发记录
    pub async fn resolve_failure(
        &self,
        log: ExecutionLog,
        fired: &FiredTrigger,
        reason: &str,
    ) -> SchedulerResult<Resolution> {
        let failed = log.fail(reason)?;
        self.finalize(&fired.key(), failed).await
    }

    /// INIT -> WAIT
    ///
    /// 仅当库中日志仍为 INIT 时写入；回调已先一步写入终态时返回库中的终态日志。
    pub async fn mark_waiting(&self, log: ExecutionLog) -> SchedulerResult<ExecutionLog> {
        let log_id = log.id;
        let waiting = log.waiting()?;
        if self
            .log_repo
            .update_if_status(&waiting, LogStatus::Init)
            .await?
        {
            return Ok(waiting);
        }

        debug!("日志 {} 已被回调处理，保留现有状态", log_id);
        self.log_repo
            .get_by_id(log_id)
            .await?
            .ok_or(SchedulerError::LogNotFound { id: log_id })
    }

    /// 回调路径：删除匹配的触发记录并写入终态日志
    pub async fn resolve_success_externally(
        &self,
        trigger_id: i64,
        endpoint_id: i64,
        final_log: ExecutionLog,
    ) -> SchedulerResult<Resolution> {
        if !final_log.is_terminal() {
            return Err(SchedulerError::Internal(format!(
                "回调写入的日志 {} 不是终态: {}",
                final_log.id, final_log.status
            )));
        }
        let key = FiredTriggerKey::for_log(trigger_id, endpoint_id, &final_log);
        self.finalize(&key, final_log).await
    }

    async fn finalize(
        &self,
        key: &FiredTriggerKey,
        final_log: ExecutionLog,
    ) -> SchedulerResult<Resolution> {
        let applied = self
            .fired_repo
            .remove_and_update_log(key, &final_log)
            .await?;
        StructuredLogger::log_execution_resolved(final_log.id, final_log.status.as_str(), applied);

        if applied {
            Ok(Resolution::Resolved(final_log))
        } else {
            Ok(Resolution::AlreadyResolved)
        }
    }
}
