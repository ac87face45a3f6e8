use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crawler_dispatcher::CompletionReport;
use crawler_domain::{CompletedJobPayload, JobDescriptor};

use crate::{
    error::{ApiError, ApiResult},
    response::ApiResponse,
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct LeaseQuery {
    pub count: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteJobsRequest {
    pub data: Vec<CompletedJobPayload>,
}

/// `GET /master/job?count=N`
pub async fn lease_jobs(
    State(state): State<AppState>,
    query: Result<Query<LeaseQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<JobDescriptor>>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let count = match query.count {
        Some(0) => return Err(ApiError::BadRequest("count 必须大于0".to_string())),
        Some(count) => count.min(state.max_lease_count),
        None => state.default_lease_count,
    };

    let jobs = state.scheduler.lease(count).await;
    debug!(requested = count, leased = jobs.len(), "Lease request served");
    Ok(Json(jobs))
}

/// `PUT /master/job`
pub async fn complete_jobs(
    State(state): State<AppState>,
    payload: Result<Json<CompleteJobsRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<CompletionReport>> {
    let Json(request) = payload.map_err(|e| {
        warn!("Rejected completion payload: {}", e);
        ApiError::BadRequest(e.body_text())
    })?;

    let report = state.scheduler.complete(request.data).await?;
    Ok(ApiResponse::success(report))
}
