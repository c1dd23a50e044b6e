//! 可观测性模块
//!
//! - 指标收集（`metrics` 门面，由进程入口安装 Prometheus 导出器）
//! - 分发事件的结构化日志
//! - 分发流程的 tracing span

pub mod dispatch_tracer;
pub mod metrics_collector;
pub mod structured_logger;

pub use dispatch_tracer::DispatchTracer;
pub use metrics_collector::MetricsCollector;
pub use structured_logger::StructuredLogger;
