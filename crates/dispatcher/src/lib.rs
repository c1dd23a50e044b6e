//! 分发核心
//!
//! - [`router`]：从执行器机器中按策略选出一台
//! - [`pool`]：有界的分发线程池，饱和时由提交方执行
//! - [`tracker`]：执行日志与触发记录的生命周期
//! - [`engine`]：单个触发器的分发流程与批量并发分发

pub mod engine;
pub mod pool;
pub mod router;
pub mod tracker;


pub use engine::*;
pub use pool::{DispatchPool, PoolSettings, Submission};
pub use router::{RouteStrategy, Router, StrategyTable};
pub use tracker::{ExecutionTracker, Resolution};
