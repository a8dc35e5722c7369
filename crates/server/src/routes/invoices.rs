use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, patch, post},
};
use db::models::invoice::{Invoice, InvoiceFilter, InvoiceStatusSummary};
use deployment::Deployment;
use services::services::invoices::{
    CreateInvoice, CreateInvoiceFromJobs, InvoiceDetail, InvoiceService, NextInvoiceNumber,
    UpdateInvoice, UpdateInvoiceStatus,
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::TeamContext};

pub async fn list_invoices(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Query(filter): Query<InvoiceFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<Invoice>>>, ApiError> {
    let invoices = Invoice::list(&deployment.db().pool, ctx.team_id, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(invoices)))
}

/// Count and total per status, for the dashboard cards.
pub async fn invoice_summary(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
) -> Result<ResponseJson<ApiResponse<Vec<InvoiceStatusSummary>>>, ApiError> {
    let summary = InvoiceService::summary(deployment.db(), ctx.team_id).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

/// Preview only; the number is allocated when the invoice is saved.
pub async fn next_invoice_number(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
) -> Result<ResponseJson<ApiResponse<NextInvoiceNumber>>, ApiError> {
    let next = InvoiceService::next_number(deployment.db(), ctx.team_id).await?;
    Ok(ResponseJson(ApiResponse::success(next)))
}

pub async fn get_invoice(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(invoice_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<InvoiceDetail>>, ApiError> {
    let invoice = InvoiceService::get(deployment.db(), ctx.team_id, invoice_id).await?;
    Ok(ResponseJson(ApiResponse::success(invoice)))
}

pub async fn create_invoice(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    axum::Json(payload): axum::Json<CreateInvoice>,
) -> Result<ResponseJson<ApiResponse<Invoice>>, ApiError> {
    let invoice = InvoiceService::create(deployment.db(), ctx.team_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(invoice)))
}

pub async fn create_invoice_from_jobs(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    axum::Json(payload): axum::Json<CreateInvoiceFromJobs>,
) -> Result<ResponseJson<ApiResponse<InvoiceDetail>>, ApiError> {
    let invoice = InvoiceService::create_from_jobs(deployment.db(), ctx.team_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(invoice)))
}

pub async fn update_invoice(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(invoice_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateInvoice>,
) -> Result<ResponseJson<ApiResponse<Invoice>>, ApiError> {
    let invoice = InvoiceService::update(deployment.db(), ctx.team_id, invoice_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(invoice)))
}

pub async fn update_invoice_status(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(invoice_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateInvoiceStatus>,
) -> Result<ResponseJson<ApiResponse<Invoice>>, ApiError> {
    let invoice =
        InvoiceService::set_status(deployment.db(), ctx.team_id, invoice_id, payload.status)
            .await?;
    Ok(ResponseJson(ApiResponse::success(invoice)))
}

pub async fn delete_invoice(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(invoice_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    InvoiceService::delete(deployment.db(), ctx.team_id, invoice_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/invoices",
        Router::new()
            .route("/", get(list_invoices).post(create_invoice))
            .route("/summary", get(invoice_summary))
            .route("/next-number", get(next_invoice_number))
            .route("/from-jobs", post(create_invoice_from_jobs))
            .route(
                "/{invoice_id}",
                get(get_invoice).patch(update_invoice).delete(delete_invoice),
            )
            .route("/{invoice_id}/status", patch(update_invoice_status)),
    )
}
