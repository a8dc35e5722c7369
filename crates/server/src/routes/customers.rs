use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::{
    is_foreign_key_violation,
    models::{
        customer::{CreateCustomer, Customer, CustomerFilter, CustomerWithStats, UpdateCustomer},
        tag::Tag,
    },
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::customer_linking::{
    self, LinkCandidate, LinkJobsRequest, LinkJobsResult,
};
use tracing::info;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::TeamContext};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCustomerResponse {
    pub customer: CustomerWithStats,
    /// Unlinked jobs attached to the new customer by name.
    pub linked_jobs: u64,
}

async fn load_customer(
    deployment: &DeploymentImpl,
    team_id: Uuid,
    customer_id: Uuid,
) -> Result<Customer, ApiError> {
    Customer::find_by_id(&deployment.db().pool, team_id, customer_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("customer not found".to_string()))
}

async fn load_tag(deployment: &DeploymentImpl, team_id: Uuid, tag_id: Uuid) -> Result<Tag, ApiError> {
    Tag::find_by_id(&deployment.db().pool, team_id, tag_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("tag not found".to_string()))
}

fn require_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("customer name cannot be empty".to_string()));
    }
    Ok(())
}

pub async fn list_customers(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Query(filter): Query<CustomerFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<CustomerWithStats>>>, ApiError> {
    let customers = Customer::list(&deployment.db().pool, ctx.team_id, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(customers)))
}

pub async fn get_customer(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(customer_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<CustomerWithStats>>, ApiError> {
    let customer = load_customer(&deployment, ctx.team_id, customer_id).await?;
    let customer = Customer::with_stats(&deployment.db().pool, customer).await?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

/// Creates the customer, attaches its tags and, unless `link_jobs` is
/// false, links existing jobs typed with the same name.
pub async fn create_customer(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    axum::Json(payload): axum::Json<CreateCustomer>,
) -> Result<ResponseJson<ApiResponse<CreateCustomerResponse>>, ApiError> {
    require_name(&payload.name)?;
    let pool = &deployment.db().pool;

    let tag_ids = payload.tag_ids.clone().unwrap_or_default();
    for tag_id in &tag_ids {
        load_tag(&deployment, ctx.team_id, *tag_id).await?;
    }

    let customer = Customer::create(pool, ctx.team_id, &payload).await?;
    for tag_id in tag_ids {
        Tag::assign_to_customer(pool, ctx.team_id, customer.id, tag_id).await?;
    }
    info!(team_id = %ctx.team_id, customer_id = %customer.id, "Customer created");

    let linked_jobs = if payload.link_jobs.unwrap_or(true) {
        customer_linking::link_jobs(deployment.db(), &customer, None)
            .await?
            .linked_jobs
    } else {
        0
    };

    let customer = Customer::with_stats(pool, customer).await?;
    Ok(ResponseJson(ApiResponse::success(CreateCustomerResponse {
        customer,
        linked_jobs,
    })))
}

pub async fn update_customer(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(customer_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateCustomer>,
) -> Result<ResponseJson<ApiResponse<CustomerWithStats>>, ApiError> {
    if let Some(name) = &payload.name {
        require_name(name)?;
    }
    let pool = &deployment.db().pool;
    let customer = Customer::update(pool, ctx.team_id, customer_id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("customer not found".to_string()))?;
    let customer = Customer::with_stats(pool, customer).await?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

/// Jobs keep their typed customer name and lose the link. Customers that
/// have been invoiced cannot be deleted.
pub async fn delete_customer(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(customer_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let customer = load_customer(&deployment, ctx.team_id, customer_id).await?;
    let pool = &deployment.db().pool;
    if Customer::count_invoices(pool, customer.id).await? > 0 {
        return Err(customer_in_use());
    }
    // An invoice created after the count still trips the foreign key.
    Customer::delete(pool, ctx.team_id, customer.id)
        .await
        .map_err(delete_error)?;
    Ok(ResponseJson(ApiResponse::success(())))
}

fn customer_in_use() -> ApiError {
    ApiError::Conflict("customer has invoices and cannot be deleted".to_string())
}

fn delete_error(err: sqlx::Error) -> ApiError {
    if is_foreign_key_violation(&err) {
        customer_in_use()
    } else {
        err.into()
    }
}

pub async fn link_candidates(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(customer_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<LinkCandidate>>>, ApiError> {
    let customer = load_customer(&deployment, ctx.team_id, customer_id).await?;
    let candidates = customer_linking::find_candidates(deployment.db(), &customer).await?;
    Ok(ResponseJson(ApiResponse::success(candidates)))
}

pub async fn link_jobs(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(customer_id): Path<Uuid>,
    payload: Option<axum::Json<LinkJobsRequest>>,
) -> Result<ResponseJson<ApiResponse<LinkJobsResult>>, ApiError> {
    let customer = load_customer(&deployment, ctx.team_id, customer_id).await?;
    let request = payload.map(|axum::Json(request)| request).unwrap_or_default();
    let result =
        customer_linking::link_jobs(deployment.db(), &customer, request.job_ids.as_deref()).await?;
    Ok(ResponseJson(ApiResponse::success(result)))
}

pub async fn assign_tag(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path((customer_id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let customer = load_customer(&deployment, ctx.team_id, customer_id).await?;
    let tag = load_tag(&deployment, ctx.team_id, tag_id).await?;
    Tag::assign_to_customer(&deployment.db().pool, ctx.team_id, customer.id, tag.id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn unassign_tag(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path((customer_id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let removed =
        Tag::unassign_from_customer(&deployment.db().pool, ctx.team_id, customer_id, tag_id)
            .await?;
    if removed == 0 {
        return Err(ApiError::NotFound("tag is not assigned to this customer".to_string()));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/customers",
        Router::new()
            .route("/", get(list_customers).post(create_customer))
            .route(
                "/{customer_id}",
                get(get_customer).patch(update_customer).delete(delete_customer),
            )
            .route("/{customer_id}/link-candidates", get(link_candidates))
            .route("/{customer_id}/link-jobs", post(link_jobs))
            .route(
                "/{customer_id}/tags/{tag_id}",
                post(assign_tag).delete(unassign_tag),
            ),
    )
}

#[cfg(test)]
mod tests {
    use std::{borrow::Cow, error::Error as StdError, fmt};

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    #[derive(Debug)]
    struct ForeignKeyViolation;

    impl fmt::Display for ForeignKeyViolation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("update or delete on table \"customers\" violates foreign key constraint")
        }
    }

    impl StdError for ForeignKeyViolation {}

    impl DatabaseError for ForeignKeyViolation {
        fn message(&self) -> &str {
            "violates foreign key constraint"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23503"))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::ForeignKeyViolation
        }
    }

    #[test]
    fn invoiced_customer_delete_race_is_a_conflict() {
        let err = delete_error(sqlx::Error::Database(Box::new(ForeignKeyViolation)));
        assert!(matches!(err, ApiError::Conflict(msg) if msg.contains("has invoices")));
    }

    #[test]
    fn other_delete_errors_stay_database_errors() {
        let err = delete_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, ApiError::Database(sqlx::Error::RowNotFound)));
    }
}
