use axum::{
    Extension, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, patch},
};
use db::{
    is_unique_violation,
    models::tag::{CreateTag, Tag, UpdateTag},
};
use deployment::Deployment;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::TeamContext};

fn tag_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("tag name cannot be empty".to_string()));
    }
    Ok(name)
}

fn duplicate_name(err: sqlx::Error, name: &str) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::Conflict(format!("a tag named '{name}' already exists"))
    } else {
        err.into()
    }
}

pub async fn list_tags(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
) -> Result<ResponseJson<ApiResponse<Vec<Tag>>>, ApiError> {
    let tags = Tag::find_by_team(&deployment.db().pool, ctx.team_id).await?;
    Ok(ResponseJson(ApiResponse::success(tags)))
}

pub async fn create_tag(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    axum::Json(payload): axum::Json<CreateTag>,
) -> Result<ResponseJson<ApiResponse<Tag>>, ApiError> {
    let name = tag_name(&payload.name)?;
    let tag = Tag::create(&deployment.db().pool, ctx.team_id, name)
        .await
        .map_err(|e| duplicate_name(e, name))?;
    Ok(ResponseJson(ApiResponse::success(tag)))
}

pub async fn update_tag(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(tag_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateTag>,
) -> Result<ResponseJson<ApiResponse<Tag>>, ApiError> {
    let name = tag_name(&payload.name)?;
    let tag = Tag::rename(&deployment.db().pool, ctx.team_id, tag_id, name)
        .await
        .map_err(|e| duplicate_name(e, name))?
        .ok_or_else(|| ApiError::NotFound("tag not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(tag)))
}

pub async fn delete_tag(
    State(deployment): State<DeploymentImpl>,
    Extension(ctx): Extension<TeamContext>,
    Path(tag_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let deleted = Tag::delete(&deployment.db().pool, ctx.team_id, tag_id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("tag not found".to_string()));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/tags",
        Router::new()
            .route("/", get(list_tags).post(create_tag))
            .route("/{tag_id}", patch(update_tag).delete(delete_tag)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_names_are_trimmed_and_required() {
        assert_eq!(tag_name("  Regular  ").unwrap(), "Regular");
        assert!(tag_name("   ").is_err());
    }
}
