use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use tesseract_core::ExecutionLogRepository;
use tesseract_dispatcher::TriggerDispatcher;

use crate::handlers::{
    callback::executor_callback, dispatch::dispatch_triggers, health::health_check,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<TriggerDispatcher>,
    pub log_repo: Arc<dyn ExecutionLogRepository>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/tesseract-admin/callback", post(executor_callback))
        .route("/tesseract-admin/dispatch", post(dispatch_triggers))
        .with_state(state)
}
