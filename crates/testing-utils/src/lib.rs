//! # Tesseract Testing Utils
//!
//! 分发核心各 crate 共用的测试工具，仅作为 dev-dependency 使用。
//!
//! - **内存仓储**：实现全部仓储接口，成对操作在同一把锁内原子完成
//! - **Mock 传输**：按机器地址编排响应，记录收到的请求
//! - **测试数据构建器**：带默认值的触发器、任务与机器
//!
//! ```toml
//! [dev-dependencies]
//! tesseract-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
