//! # Tesseract API
//!
//! 分发核心的 HTTP 入口，基于 Axum：
//!
//! - `POST /tesseract-admin/callback` - 执行器回调执行结果
//! - `POST /tesseract-admin/dispatch` - 外部触发器评估方提交一批待分发的触发器
//! - `GET /health` - 健康检查
//!
//! ## 响应格式
//!
//! ```json
//! {
//!   "success": true,
//!   "data": { "resolved": true },
//!   "message": null,
//!   "timestamp": "2024-01-01T00:00:00Z"
//! }
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use tower::ServiceBuilder;

use middleware::request_logging;
pub use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(state: AppState) -> Router {
    create_routes(state).layer(
        ServiceBuilder::new().layer(axum::middleware::from_fn(request_logging)),
    )
}
