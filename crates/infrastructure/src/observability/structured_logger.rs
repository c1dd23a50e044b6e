//! 分发事件的结构化日志
//!
//! 每条日志都带 `event` 字段，便于在 JSON 输出中按事件检索。

use tracing::{debug, error, info, warn};

pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_batch_received(batch_size: usize, is_once: bool) {
        info!(
            event = "dispatch_batch_received",
            batch.size = batch_size,
            batch.once = is_once,
            "Dispatch batch received"
        );
    }

    pub fn log_batch_submitted(queued: usize, spawned: usize, inline: usize, rejected: usize) {
        debug!(
            event = "dispatch_batch_submitted",
            batch.queued = queued,
            batch.spawned = spawned,
            batch.inline = inline,
            batch.rejected = rejected,
            "Dispatch batch submitted"
        );
    }

    /// 分发前即失败：任务、执行器或机器缺失
    pub fn log_dispatch_skipped(trigger_id: i64, trigger_name: &str, reason: &str) {
        warn!(
            event = "dispatch_skipped",
            trigger.id = trigger_id,
            trigger.name = trigger_name,
            dispatch.reason = reason,
            "Trigger could not be dispatched"
        );
    }

    pub fn log_endpoint_selected(
        trigger_id: i64,
        strategy: &str,
        endpoint_id: i64,
        address: &str,
        candidates: usize,
    ) {
        debug!(
            event = "endpoint_selected",
            trigger.id = trigger_id,
            route.strategy = strategy,
            endpoint.id = endpoint_id,
            endpoint.address = address,
            route.candidates = candidates,
            "Worker endpoint selected"
        );
    }

    pub fn log_dispatch_accepted(trigger_id: i64, log_id: i64, address: &str, duration_ms: u64) {
        info!(
            event = "dispatch_accepted",
            trigger.id = trigger_id,
            log.id = log_id,
            endpoint.address = address,
            transport.duration_ms = duration_ms,
            "Executor accepted the request"
        );
    }

    pub fn log_dispatch_rejected(trigger_id: i64, log_id: i64, address: &str, message: &str) {
        error!(
            event = "dispatch_rejected",
            trigger.id = trigger_id,
            log.id = log_id,
            endpoint.address = address,
            dispatch.error = message,
            "Executor rejected the request or was unreachable"
        );
    }

    pub fn log_execution_resolved(log_id: i64, status: &str, applied: bool) {
        if applied {
            info!(
                event = "execution_resolved",
                log.id = log_id,
                log.status = status,
                "Execution outcome recorded"
            );
        } else {
            warn!(
                event = "execution_already_resolved",
                log.id = log_id,
                log.status = status,
                "Execution outcome ignored, already resolved"
            );
        }
    }

    pub fn log_pool_saturated(active_workers: usize, queue_capacity: usize) {
        warn!(
            event = "dispatch_pool_saturated",
            pool.active_workers = active_workers,
            pool.queue_capacity = queue_capacity,
            "Dispatch pool saturated, running on submitter"
        );
    }

    pub fn log_storage_error(operation: &str, error: &str) {
        error!(
            event = "storage_error",
            db.operation = operation,
            db.error = error,
            "Storage operation failed"
        );
    }
}
