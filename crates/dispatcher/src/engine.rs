//! 分发引擎
//!
//! 对一批已触发的触发器并发分发：查任务 -> 查执行器 -> 查机器 -> 路由 ->
//! 写日志与触发记录 -> 发送请求 -> 根据响应收尾。每个触发器独立执行，
//! 一个触发器的失败不影响其他触发器。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{error, info, warn, Instrument};

use tesseract_core::{
    DispatcherConfig, ExecutionLog, ExecutionLogRepository, ExecutorDetailRepository,
    ExecutorRepository, ExecutorRequest, ExecutorTransport, FiredTriggerRepository,
    JobDetailRepository, SchedulerResult, Trigger, TriggerRepository, MSG_NO_LIVE_MACHINE,
    MSG_NO_RUNNABLE_JOB, MSG_NO_USABLE_EXECUTOR,
};
use tesseract_infrastructure::{DispatchTracer, MetricsCollector, StructuredLogger};

use crate::pool::{DispatchPool, PoolSettings, Submission};
use crate::router::Router;
use crate::tracker::{ExecutionTracker, Resolution};

/// 单个触发器的分发结果，仅用于日志、指标与测试
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// 缺少任务、执行器或机器，已写入 FAIL 日志
    ConfigurationMissing(ExecutionLog),
    /// 执行器已接收，等待回调
    Pending(ExecutionLog),
    /// 执行器拒绝或不可达，日志已置为 FAIL
    TransportFailure(ExecutionLog),
    /// 存储或路由错误中止了分发
    Aborted(String),
}

/// 分发引擎依赖的存储接口
#[derive(Clone)]
pub struct DispatchRepositories {
    pub triggers: Arc<dyn TriggerRepository>,
    pub jobs: Arc<dyn JobDetailRepository>,
    pub executors: Arc<dyn ExecutorRepository>,
    pub endpoints: Arc<dyn ExecutorDetailRepository>,
    pub logs: Arc<dyn ExecutionLogRepository>,
    pub fired: Arc<dyn FiredTriggerRepository>,
}

/// 批量提交的统计，只用于日志
#[derive(Debug, Default)]
struct BatchReport {
    queued: usize,
    spawned: usize,
    inline: usize,
    rejected: usize,
}

struct DispatchContext {
    repos: DispatchRepositories,
    router: Router,
    tracker: ExecutionTracker,
    transport: Arc<dyn ExecutorTransport>,
    metrics: MetricsCollector,
}

pub struct TriggerDispatcher {
    context: Arc<DispatchContext>,
    pool: DispatchPool,
    shutdown_timeout: Duration,
}

impl TriggerDispatcher {
    pub fn new(
        repos: DispatchRepositories,
        transport: Arc<dyn ExecutorTransport>,
        config: &DispatcherConfig,
    ) -> Self {
        let tracker = ExecutionTracker::new(repos.logs.clone(), repos.fired.clone());
        Self {
            context: Arc::new(DispatchContext {
                repos,
                router: Router::new(),
                tracker,
                transport,
                metrics: MetricsCollector::new(),
            }),
            pool: DispatchPool::new(PoolSettings::from(config)),
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_seconds),
        }
    }

    pub fn tracker(&self) -> &ExecutionTracker {
        &self.context.tracker
    }

    pub fn pool(&self) -> &DispatchPool {
        &self.pool
    }

    /// 分发一批触发器
    ///
    /// 全部提交后返回，不等待队列中的任务执行完。线程池饱和时部分任务在当前调用中执行。
    /// 分发结果只体现在执行日志与触发记录中。
    pub async fn dispatch_batch(&self, triggers: Vec<Trigger>, is_once: bool) {
        let span = DispatchTracer::dispatch_batch_span(triggers.len(), is_once);
        async {
            StructuredLogger::log_batch_received(triggers.len(), is_once);

            let submissions = triggers.into_iter().map(|trigger| {
                let context = self.context.clone();
                self.pool.submit(Box::pin(async move {
                    context.dispatch_one(trigger, is_once).await;
                }))
            });

            let mut report = BatchReport::default();
            for submission in join_all(submissions).await {
                match submission {
                    Submission::Queued => report.queued += 1,
                    Submission::Spawned => report.spawned += 1,
                    Submission::Inline => {
                        self.context.metrics.record_inline_dispatch();
                        report.inline += 1;
                    }
                    Submission::Rejected => report.rejected += 1,
                }
            }

            if report.inline > 0 {
                StructuredLogger::log_pool_saturated(
                    self.pool.live_workers(),
                    self.pool.settings().queue_capacity,
                );
            }
            if report.rejected > 0 {
                warn!("分发线程池已关闭，{} 个触发器未被分发", report.rejected);
            }
            self.context
                .metrics
                .update_queue_depth(self.pool.queued() as f64);
            StructuredLogger::log_batch_submitted(
                report.queued,
                report.spawned,
                report.inline,
                report.rejected,
            );
        }
        .instrument(span)
        .await
    }

    /// 按触发器ID分发，返回找到的触发器数
    pub async fn dispatch_by_ids(&self, trigger_ids: &[i64], is_once: bool) -> SchedulerResult<usize> {
        let triggers = self.context.repos.triggers.get_by_ids(trigger_ids).await?;
        if triggers.len() < trigger_ids.len() {
            warn!(
                "请求分发 {} 个触发器，仅找到 {} 个",
                trigger_ids.len(),
                triggers.len()
            );
        }
        let found = triggers.len();
        self.dispatch_batch(triggers, is_once).await;
        Ok(found)
    }

    /// 在当前任务中直接分发单个触发器，不经过线程池
    pub async fn dispatch_one(&self, trigger: Trigger, is_once: bool) -> DispatchOutcome {
        self.context.dispatch_one(trigger, is_once).await
    }

    /// 优雅关闭，超时后强制关闭
    pub async fn shutdown(&self) {
        info!("正在关闭分发引擎，最多等待 {:?}", self.shutdown_timeout);
        if tokio::time::timeout(self.shutdown_timeout, self.pool.shutdown())
            .await
            .is_err()
        {
            warn!("等待在途分发任务超时，强制关闭");
            self.shutdown_now().await;
        }
    }

    /// 立即关闭，被中断的任务保留触发记录
    pub async fn shutdown_now(&self) -> usize {
        self.pool.shutdown_now().await
    }
}

impl DispatchContext {
    async fn dispatch_one(&self, trigger: Trigger, is_once: bool) -> DispatchOutcome {
        let span = DispatchTracer::dispatch_trigger_span(trigger.id, &trigger.name);
        async {
            self.metrics.record_dispatch();
            match self.try_dispatch(&trigger, is_once).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    StructuredLogger::log_storage_error("dispatch_trigger", &e.to_string());
                    error!("触发器 {} 分发中止: {}", trigger.name, e);
                    self.metrics.record_dispatch_failure("aborted");
                    DispatchOutcome::Aborted(e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn try_dispatch(
        &self,
        trigger: &Trigger,
        is_once: bool,
    ) -> SchedulerResult<DispatchOutcome> {
        let Some(job) = self.repos.jobs.find_by_trigger_id(trigger.id).await? else {
            return self
                .configuration_missing(trigger, None, MSG_NO_RUNNABLE_JOB, "no_job", is_once)
                .await;
        };

        if self
            .repos
            .executors
            .get_by_id(trigger.executor_group_id)
            .await?
            .is_none()
        {
            return self
                .configuration_missing(
                    trigger,
                    Some(&job.class_name),
                    MSG_NO_USABLE_EXECUTOR,
                    "no_executor",
                    is_once,
                )
                .await;
        }

        let endpoints = self
            .repos
            .endpoints
            .list_by_executor(trigger.executor_group_id)
            .await?;
        if endpoints.is_empty() {
            return self
                .configuration_missing(
                    trigger,
                    Some(&job.class_name),
                    MSG_NO_LIVE_MACHINE,
                    "no_machine",
                    is_once,
                )
                .await;
        }

        let endpoint = self
            .router
            .select(&trigger.routing_strategy, trigger, &endpoints)?;
        StructuredLogger::log_endpoint_selected(
            trigger.id,
            &trigger.routing_strategy,
            endpoint.id,
            &endpoint.address,
            endpoints.len(),
        );

        let (log, fired) = self.tracker.begin(trigger, &job, endpoint, is_once).await?;
        tracing::Span::current().record("log.id", log.id);

        let request = ExecutorRequest {
            class_name: job.class_name.clone(),
            sharding_index: trigger.sharding_index,
            log_id: log.id,
            trigger_id: trigger.id,
            executor_id: trigger.executor_group_id,
        };

        let started = Instant::now();
        let response = self.transport.send(&endpoint.address, &request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if response.is_success() {
            StructuredLogger::log_dispatch_accepted(trigger.id, log.id, &endpoint.address, elapsed_ms);
            let log = self.tracker.mark_waiting(log).await?;
            return Ok(DispatchOutcome::Pending(log));
        }

        let reason = response
            .body_text()
            .unwrap_or_else(|| format!("executor {} rejected the request", endpoint.address));
        StructuredLogger::log_dispatch_rejected(trigger.id, log.id, &endpoint.address, &reason);
        self.metrics.record_dispatch_failure("transport");

        let log_id = log.id;
        match self.tracker.resolve_failure(log, &fired, &reason).await? {
            Resolution::Resolved(log) => Ok(DispatchOutcome::TransportFailure(log)),
            // 执行器在返回失败前已回调，以库中日志为准
            Resolution::AlreadyResolved => {
                let current = self.repos.logs.get_by_id(log_id).await?;
                Ok(match current {
                    Some(log) => DispatchOutcome::TransportFailure(log),
                    None => DispatchOutcome::Aborted(format!("log {log_id} disappeared")),
                })
            }
        }
    }

    async fn configuration_missing(
        &self,
        trigger: &Trigger,
        class_name: Option<&str>,
        reason: &str,
        metric_reason: &'static str,
        is_once: bool,
    ) -> SchedulerResult<DispatchOutcome> {
        StructuredLogger::log_dispatch_skipped(trigger.id, &trigger.name, reason);
        self.metrics.record_dispatch_failure(metric_reason);
        let log = self
            .tracker
            .fail_before_dispatch(trigger, class_name, reason, is_once)
            .await?;
        Ok(DispatchOutcome::ConfigurationMissing(log))
    }
}
