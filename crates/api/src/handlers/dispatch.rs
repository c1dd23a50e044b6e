use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    response::accepted,
    routes::AppState,
};

/// 批量分发请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub trigger_ids: Vec<i64>,
    /// 手动单次触发
    #[serde(default)]
    pub once: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchAccepted {
    pub requested: usize,
    pub found: usize,
}

pub async fn dispatch_triggers(
    State(state): State<AppState>,
    Json(request): Json<DispatchRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.trigger_ids.is_empty() {
        return Err(ApiError::BadRequest("triggerIds 不能为空".to_string()));
    }
    if state.dispatcher.pool().is_shutdown() {
        return Err(tesseract_core::SchedulerError::PoolShutdown.into());
    }

    let found = state
        .dispatcher
        .dispatch_by_ids(&request.trigger_ids, request.once)
        .await?;

    Ok(accepted(
        DispatchAccepted {
            requested: request.trigger_ids.len(),
            found,
        },
        format!("已提交 {found} 个触发器"),
    ))
}
