use axum::{
    Extension, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, patch, post},
};
use db::models::job::{CreateJob, JobFilter, UpdateJob};
use deployment::Deployment;
use services::services::{
    job_import::{self, ImportRequest, ImportResult, MappingRequest, MappingSuggestion},
    jobs::{JobService, JobWithFigures, UpdateJobStatus},
};
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::TeamContext};

/// Import payloads carry up to a few thousand spreadsheet rows.
const IMPORT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// GET /api/jobs
pub async fn list_jobs(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Query(filter): Query<JobFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<JobWithFigures>>>, ApiError> {
    let jobs = JobService::list(deployment.db(), ctx.team_id, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(jobs)))
}

/// GET /api/jobs/{job_id}
pub async fn get_job(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(job_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<JobWithFigures>>, ApiError> {
    let job = JobService::get(deployment.db(), ctx.team_id, job_id).await?;
    Ok(ResponseJson(ApiResponse::success(job)))
}

/// POST /api/jobs
pub async fn create_job(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    axum::Json(payload): axum::Json<CreateJob>,
) -> Result<ResponseJson<ApiResponse<JobWithFigures>>, ApiError> {
    let job = JobService::create(deployment.db(), ctx.team_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(job)))
}

/// PATCH /api/jobs/{job_id}
pub async fn update_job(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(job_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateJob>,
) -> Result<ResponseJson<ApiResponse<JobWithFigures>>, ApiError> {
    let job = JobService::update(deployment.db(), ctx.team_id, job_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(job)))
}

/// PATCH /api/jobs/{job_id}/status
pub async fn update_job_status(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(job_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateJobStatus>,
) -> Result<ResponseJson<ApiResponse<JobWithFigures>>, ApiError> {
    let job = JobService::set_status(deployment.db(), ctx.team_id, job_id, payload.status).await?;
    Ok(ResponseJson(ApiResponse::success(job)))
}

/// DELETE /api/jobs/{job_id}
pub async fn delete_job(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(job_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    JobService::delete(deployment.db(), ctx.team_id, job_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/jobs/import/mapping
pub async fn suggest_import_mapping(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    axum::Json(payload): axum::Json<MappingRequest>,
) -> Result<ResponseJson<ApiResponse<MappingSuggestion>>, ApiError> {
    let suggestion = job_import::suggest_mapping(deployment.claude(), &payload).await?;
    info!(
        team_id = %ctx.team_id,
        source = ?suggestion.source,
        mapped = suggestion.mapping.len(),
        "Suggested import mapping"
    );
    Ok(ResponseJson(ApiResponse::success(suggestion)))
}

/// POST /api/jobs/import
pub async fn import_jobs(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    axum::Json(payload): axum::Json<ImportRequest>,
) -> Result<ResponseJson<ApiResponse<ImportResult>>, ApiError> {
    let result = job_import::import_jobs(deployment.db(), ctx.team_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(result)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/jobs",
        Router::new()
            .route("/", get(list_jobs).post(create_job))
            .route("/import/mapping", post(suggest_import_mapping))
            .route(
                "/import",
                post(import_jobs).layer(DefaultBodyLimit::max(IMPORT_BODY_LIMIT)),
            )
            .route(
                "/{job_id}",
                get(get_job).patch(update_job).delete(delete_job),
            )
            .route("/{job_id}/status", patch(update_job_status)),
    )
}
