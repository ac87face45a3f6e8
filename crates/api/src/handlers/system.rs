use axum::extract::State;

use crawler_dispatcher::QueueSnapshot;

use crate::{
    error::{ApiError, ApiResult},
    response::ApiResponse,
    routes::AppState,
};

pub async fn queue_status(State(state): State<AppState>) -> ApiResult<ApiResponse<QueueSnapshot>> {
    let snapshot = state.scheduler.snapshot().await;
    Ok(ApiResponse::success(snapshot))
}

/// Prometheus 文本格式的指标，未启用时返回404
pub async fn metrics(State(state): State<AppState>) -> ApiResult<String> {
    match &state.metrics_handle {
        Some(handle) => Ok(handle.render()),
        None => Err(ApiError::NotFound),
    }
}
