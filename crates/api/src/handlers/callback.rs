use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};

use tesseract_core::SchedulerError;
use tesseract_infrastructure::DispatchTracer;

use crate::{error::ApiResult, response::success, routes::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallbackStatus {
    Success,
    Fail,
}

/// 执行器回调请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    pub trigger_id: i64,
    pub executor_detail_id: i64,
    pub log_id: i64,
    pub status: CallbackStatus,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackResult {
    /// 本次回调是否完成了收尾，重复回调为 false
    pub resolved: bool,
}

/// 执行器回调执行结果
pub async fn executor_callback(
    State(state): State<AppState>,
    Json(request): Json<CallbackRequest>,
) -> ApiResult<impl IntoResponse> {
    let status = match request.status {
        CallbackStatus::Success => "SUCCESS",
        CallbackStatus::Fail => "FAIL",
    };
    let span = DispatchTracer::callback_span(request.log_id, status);

    let result = resolve_callback(state, request).instrument(span).await?;
    Ok(success(result))
}

async fn resolve_callback(state: AppState, request: CallbackRequest) -> ApiResult<CallbackResult> {
    let log = state
        .log_repo
        .get_by_id(request.log_id)
        .await?
        .ok_or(SchedulerError::LogNotFound { id: request.log_id })?;

    if log.is_terminal() {
        info!("日志 {} 已是终态 {}，忽略回调", log.id, log.status);
        return Ok(CallbackResult { resolved: false });
    }

    let final_log = match request.status {
        CallbackStatus::Success => log.succeed(request.message)?,
        CallbackStatus::Fail => log.fail(
            request
                .message
                .unwrap_or_else(|| "executor reported failure".to_string()),
        )?,
    };

    let resolution = state
        .dispatcher
        .tracker()
        .resolve_success_externally(request.trigger_id, request.executor_detail_id, final_log)
        .await?;

    Ok(CallbackResult {
        resolved: resolution.is_resolved(),
    })
}
