//! 分发核心的指标收集
//!
//! 指标通过 `metrics` 门面记录，未安装导出器时所有记录均为空操作。

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use tracing::debug;

pub const DISPATCH_TOTAL: &str = "tesseract_dispatch_total";
pub const DISPATCH_FAILURES_TOTAL: &str = "tesseract_dispatch_failures_total";
pub const DISPATCH_INLINE_TOTAL: &str = "tesseract_dispatch_inline_total";
pub const TRANSPORT_DURATION_SECONDS: &str = "tesseract_transport_duration_seconds";
pub const POOL_QUEUE_DEPTH: &str = "tesseract_pool_queue_depth";

pub struct MetricsCollector {
    dispatch_total: Counter,
    dispatch_inline_total: Counter,
    transport_duration: Histogram,
    queue_depth: Gauge,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            dispatch_total: counter!(DISPATCH_TOTAL),
            dispatch_inline_total: counter!(DISPATCH_INLINE_TOTAL),
            transport_duration: histogram!(TRANSPORT_DURATION_SECONDS),
            queue_depth: gauge!(POOL_QUEUE_DEPTH),
        }
    }

    /// 一次单触发器分发开始
    pub fn record_dispatch(&self) {
        self.dispatch_total.increment(1);
    }

    /// 分发失败，`reason` 为失败分类（no_job、no_executor、no_machine、transport 等）
    pub fn record_dispatch_failure(&self, reason: &'static str) {
        counter!(DISPATCH_FAILURES_TOTAL, "reason" => reason).increment(1);
        debug!(reason = reason, "Dispatch failure recorded");
    }

    /// 线程池饱和，任务在提交方直接执行
    pub fn record_inline_dispatch(&self) {
        self.dispatch_inline_total.increment(1);
    }

    pub fn record_transport_duration(&self, duration_seconds: f64) {
        self.transport_duration.record(duration_seconds);
    }

    pub fn update_queue_depth(&self, depth: f64) {
        self.queue_depth.set(depth);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let metrics = MetricsCollector::default();
        metrics.record_dispatch();
        metrics.record_dispatch_failure("no_job");
        metrics.record_inline_dispatch();
        metrics.record_transport_duration(0.25);
        metrics.update_queue_depth(3.0);
    }
}
