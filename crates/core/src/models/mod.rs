//! # 数据模型
//!
//! 触发器分发核心使用的数据结构：
//!
//! - [`Trigger`] - 已触发的触发器，由外部时间评估组件产生
//! - [`JobDetail`] - 触发器关联的可运行任务
//! - [`ExecutorGroup`] / [`WorkerEndpoint`] - 执行器分组及其下的机器
//! - [`ExecutionLog`] - 一次分发尝试的执行日志
//! - [`FiredTrigger`] - 正在执行中的触发记录
//! - [`ExecutorRequest`] / [`ExecutorResponse`] - 与执行器之间的请求协议
//!
//! ## 执行日志状态流转
//!
//! ```text
//! INIT ──► WAIT ──► SUCCESS
//!   │        │
//!   │        └────► FAIL
//!   ├─────────────► SUCCESS (回调先于WAIT到达)
//!   └─────────────► FAIL
//! ```
//!
//! 记录都是值语义：状态变更消费旧快照并返回新快照，
//! 仓储调用接收快照并返回落库后的快照。

pub mod executor;
pub mod fired_trigger;
pub mod job;
pub mod log;
pub mod request;
pub mod trigger;

pub use executor::*;
pub use fired_trigger::*;
pub use job::*;
pub use log::*;
pub use request::*;
pub use trigger::*;
