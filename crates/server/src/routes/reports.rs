use axum::{
    Extension, Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::invoice::MonthlyTotal;
use deployment::Deployment;
use services::services::reports::{
    self, MaterialReport, ReportRange, ReportSummary, RevenueQuery,
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::TeamContext};

/// GET /api/reports/summary
pub async fn summary(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Query(range): Query<ReportRange>,
) -> Result<ResponseJson<ApiResponse<ReportSummary>>, ApiError> {
    let report = reports::summary(deployment.db(), ctx.team_id, range).await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

/// GET /api/reports/revenue
pub async fn revenue(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Query(query): Query<RevenueQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<MonthlyTotal>>>, ApiError> {
    let report = reports::revenue(deployment.db(), ctx.team_id, query).await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

/// GET /api/reports/materials
pub async fn materials(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Query(range): Query<ReportRange>,
) -> Result<ResponseJson<ApiResponse<Vec<MaterialReport>>>, ApiError> {
    let report = reports::materials(deployment.db(), ctx.team_id, range).await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/reports",
        Router::new()
            .route("/summary", get(summary))
            .route("/revenue", get(revenue))
            .route("/materials", get(materials)),
    )
}
