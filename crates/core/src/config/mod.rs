//! 配置管理
//!
//! 加载顺序：内置默认值 → TOML 配置文件 → `TESSERACT_` 前缀的环境变量。
//! 嵌套字段在环境变量中以 `__` 分隔，例如 `TESSERACT_DISPATCHER__MAX_WORKERS=64`。

pub mod models;

pub use models::*;
