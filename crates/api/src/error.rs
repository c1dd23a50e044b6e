use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tesseract_core::SchedulerError;
use tesseract_infrastructure::StructuredLogger;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度器错误: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Scheduler(SchedulerError::LogNotFound { id }) => (
                StatusCode::NOT_FOUND,
                "LOG_NOT_FOUND",
                format!("执行日志 ID {id} 不存在"),
            ),
            ApiError::Scheduler(e @ SchedulerError::InvalidStateTransition { .. }) => {
                (StatusCode::CONFLICT, "INVALID_STATE_TRANSITION", e.to_string())
            }
            ApiError::Scheduler(SchedulerError::PoolShutdown) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DISPATCHER_SHUTDOWN",
                "分发引擎正在关闭".to_string(),
            ),
            ApiError::Scheduler(e) if e.is_storage_error() => {
                StructuredLogger::log_storage_error("api", &e.to_string());
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "存储访问失败".to_string(),
                )
            }
            ApiError::Scheduler(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                e.to_string(),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                format!("请求参数错误: {msg}"),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();

        let body = Json(json!({
            "success": false,
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}
